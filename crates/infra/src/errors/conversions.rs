//! Conversions from external infrastructure errors into domain errors.

use authlab_domain::AuthLabError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuthLabError);

impl From<InfraError> for AuthLabError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthLabError> for InfraError {
    fn from(value: AuthLabError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAuthLabError {
    fn into_authlab(self) -> AuthLabError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AuthLabError */
/* -------------------------------------------------------------------------- */

impl IntoAuthLabError for HttpError {
    fn into_authlab(self) -> AuthLabError {
        if self.is_timeout() {
            return AuthLabError::Transport("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return AuthLabError::Transport("HTTP connection failure".into());
        }

        if self.is_builder() {
            return AuthLabError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => AuthLabError::Authorization { status: code, message },
                _ => AuthLabError::Transport(message),
            };
        }

        AuthLabError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_authlab())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → AuthLabError */
/* -------------------------------------------------------------------------- */

impl IntoAuthLabError for std::io::Error {
    fn into_authlab(self) -> AuthLabError {
        AuthLabError::Storage(format!("{:?}: {}", self.kind(), self))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_authlab())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn http_status_401_maps_to_authorization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: AuthLabError = InfraError::from(error).into();
        match mapped {
            AuthLabError::Authorization { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("401"));
            }
            other => panic!("expected authorization error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused_maps_to_transport() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://127.0.0.1:{port}/")).send().await.unwrap_err();

        let mapped: AuthLabError = InfraError::from(error).into();
        assert!(matches!(mapped, AuthLabError::Transport(_)), "got {mapped:?}");
    }

    #[test]
    fn io_error_maps_to_storage() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let mapped: AuthLabError = InfraError::from(err).into();
        match mapped {
            AuthLabError::Storage(msg) => assert!(msg.contains("read-only")),
            other => panic!("expected storage error, got {:?}", other),
        }
    }
}
