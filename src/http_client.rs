//! Default Http Client

use std::time::Duration;

use reqwest::{
    header::{CONTENT_TYPE, WWW_AUTHENTICATE},
    ClientBuilder, Identity, Method, Response,
};

use crate::types::{ClientCertificate, HttpMethod, HttpRequest, HttpResponse, OidcHttpClient};

/// The reqwest backed HTTP client the crate uses unless a custom
/// [OidcHttpClient] is supplied. Set `certificate` to serve mTLS bound
/// requests.
#[derive(Default)]
pub struct DefaultHttpClient {
    /// Certificate and key used for requests marked mutual TLS
    pub certificate: Option<(String, String)>,
}

impl DefaultHttpClient {
    async fn to_response(response: Response) -> HttpResponse {
        let status_code = response.status().as_u16();
        let headers = response.headers().clone();

        let header_string = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        let content_type = header_string(CONTENT_TYPE);
        let www_authenticate = header_string(WWW_AUTHENTICATE);

        let body = match response.text().await {
            Ok(text) if !text.is_empty() => Some(text),
            _ => None,
        };

        HttpResponse {
            status_code,
            content_type,
            www_authenticate,
            body,
        }
    }
}

impl OidcHttpClient for DefaultHttpClient {
    async fn get_client_certificate(&self, _req: &HttpRequest) -> Option<ClientCertificate> {
        self.certificate
            .as_ref()
            .map(|(cert, key)| ClientCertificate {
                cert: cert.clone(),
                key: key.clone(),
            })
    }

    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = ClientBuilder::new().connect_timeout(Duration::from_secs(10));

        if req.mtls {
            let (cert, key) = self
                .certificate
                .as_ref()
                .ok_or("mutual-TLS certificate and key not set")?;

            let mut combined_pem = cert.as_bytes().to_vec();
            combined_pem.extend_from_slice(key.as_bytes());
            let identity = Identity::from_pem(&combined_pem).map_err(|e| format!("{e}"))?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| format!("{e}"))?;

        let method = match req.method {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::DELETE => Method::DELETE,
        };

        let mut req_builder = client.request(method, req.url);

        if let Some(body) = req.body {
            req_builder = req_builder.body(body);
        }

        for (name, values) in req.headers {
            for value in values {
                req_builder = req_builder.header(name.clone(), value);
            }
        }

        match req_builder.send().await {
            Ok(res) => Ok(Self::to_response(res).await),
            Err(e) => Err(format!("{e}")),
        }
    }
}
