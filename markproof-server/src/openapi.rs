//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::handlers::{ExtractResponse, HealthResponse, ReadyResponse, RootResponse};

/// MarkProof Watermark API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MarkProof - Watermark API",
        version = "0.1.0",
        description = r#"
## Invisible Image Watermarking API

MarkProof hides a short bit payload inside the wavelet domain of an image and
recovers it later, even after the image has been resized.

### How It Works

1. **Embed** a payload via `POST /embed` with an image, the payload length and its bits
2. Each colour channel is decomposed with a 2-D wavelet transform
3. The payload is written into the singular values of blocks of the approximation band
4. **Extract** it later via `POST /extract`; block features are fed to a trained decoder
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    tags(
        (name = "Watermark", description = "Embed and extract invisible watermarks"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::root,
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::embed::embed_handler,
        crate::handlers::extract::extract_handler,
    ),
    components(schemas(RootResponse, HealthResponse, ReadyResponse, ExtractResponse))
)]
pub struct ApiDoc;
