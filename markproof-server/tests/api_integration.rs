//! API integration tests for markproof-server.
//!
//! These tests drive the router with realistic multipart requests, covering
//! the embed → extract flow and the error contract of every endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use markproof_core::{
    encode_png, load_rgb, Activation, DecoderService, DenseDecoder, DenseLayer, FeatureExtractor,
    ModelArtifact, Scaler,
};
use markproof_server::{
    create_router, create_router_with_config, create_router_with_state, AppState, Config,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";
const BITS: usize = 64;

/// Multipart part: (field name, optional (filename, content type), bytes)
type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, Vec<u8>);

fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file {
            Some((filename, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    // End boundary
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn embed_parts(png: Vec<u8>, length: &str, bits: &str, wavelet: Option<&str>) -> Vec<Part<'static>> {
    let mut parts: Vec<Part<'static>> = vec![
        ("image", Some(("cover.png", "image/png")), png),
        ("watermark_length", None, length.as_bytes().to_vec()),
        ("watermark_bits", None, bits.as_bytes().to_vec()),
    ];
    if let Some(wavelet) = wavelet {
        parts.push(("wavelet_type", None, wavelet.as_bytes().to_vec()));
    }
    parts
}

fn random_png(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let image = RgbImage::from_fn(width, height, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));
    encode_png(&image).expect("Failed to encode PNG")
}

/// Decoder whose output `i` is a sigmoid of the mean lattice phase of block `i`.
fn phase_decoder(bit_count: usize) -> DecoderService {
    let sequence_len = 3;
    let weights = (0..sequence_len * bit_count)
        .map(|row| {
            let mut out = vec![0.0; bit_count];
            out[row % bit_count] = 8.0 / sequence_len as f64;
            out
        })
        .collect();
    let model = DenseDecoder::from_artifact(ModelArtifact {
        input_shape: [sequence_len, bit_count],
        layers: vec![DenseLayer {
            weights,
            bias: vec![0.0; bit_count],
            activation: Activation::Sigmoid,
        }],
    })
    .expect("Failed to build model");
    let scaler = Scaler::new(vec![0.5; bit_count], vec![0.25; bit_count]).expect("Bad scaler");
    DecoderService::new(Box::new(model), scaler, FeatureExtractor::default())
        .expect("Failed to assemble decoder")
}

/// Router with a loaded decoder, as the binary builds it
fn create_decoding_app() -> Router {
    let config = Config::default();
    let state = AppState::new(&config, Some(Arc::new(phase_decoder(BITS))))
        .expect("Failed to build state");
    create_router_with_state(&config, state)
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let (content_type, body) = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn alternating_json(len: usize) -> String {
    let bits: Vec<u8> = (0..len).map(|i| (i % 2) as u8).collect();
    serde_json::to_string(&bits).unwrap()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_root_reports_running() {
    let response = create_router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Watermark API is running");
}

#[tokio::test]
async fn test_health_without_decoder_is_degraded() {
    let response = create_router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["decoder_loaded"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_reflects_decoder() {
    let response = create_router()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = create_decoding_app()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = create_router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_lists_endpoints() {
    let response = create_router()
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/embed"].is_object());
    assert!(json["paths"]["/extract"].is_object());
}

// ============================================================================
// Embed Tests
// ============================================================================

#[tokio::test]
async fn test_embed_returns_png_attachment() {
    let parts = embed_parts(random_png(256, 256, 1), "64", &alternating_json(BITS), None);
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"watermarked_image.png\""
    );

    let marked = load_rgb(&body_bytes(response).await).expect("Response is not an image");
    assert_eq!(marked.dimensions(), (256, 256));
}

#[tokio::test]
async fn test_embed_accepts_file_alias() {
    let parts: Vec<Part<'static>> = vec![
        ("file", Some(("cover.png", "image/png")), random_png(128, 128, 2)),
        ("watermark_length", None, b"16".to_vec()),
        ("watermark_bits", None, alternating_json(16).into_bytes()),
    ];
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_embed_length_mismatch_is_bad_request() {
    let parts = embed_parts(random_png(128, 128, 3), "8", "[0, 1, 1]", None);
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_embed_non_binary_bits_is_bad_request() {
    let parts = embed_parts(random_png(128, 128, 4), "3", "[0, 2, 1]", None);
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_embed_malformed_bits_is_bad_request() {
    let parts = embed_parts(random_png(128, 128, 5), "3", "0,1,1", None);
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_embed_unsupported_wavelet() {
    let parts = embed_parts(random_png(128, 128, 6), "4", "[0, 1, 0, 1]", Some("coif3"));
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_WAVELET");
}

#[tokio::test]
async fn test_embed_image_too_small() {
    let parts = embed_parts(random_png(8, 8, 7), "64", &alternating_json(64), None);
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INSUFFICIENT_CAPACITY");
}

#[tokio::test]
async fn test_embed_missing_image() {
    let parts: Vec<Part<'static>> = vec![
        ("watermark_length", None, b"4".to_vec()),
        ("watermark_bits", None, b"[0, 1, 0, 1]".to_vec()),
    ];
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_embed_rejects_non_image_upload() {
    let parts: Vec<Part<'static>> = vec![
        ("image", Some(("notes.txt", "text/plain")), b"hello".to_vec()),
        ("watermark_length", None, b"4".to_vec()),
        ("watermark_bits", None, b"[0, 1, 0, 1]".to_vec()),
    ];
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("not an image"));
}

#[tokio::test]
async fn test_embed_undecodable_image() {
    let parts = embed_parts(b"\x89PNG garbage".to_vec(), "4", "[0, 1, 0, 1]", None);
    let response = create_router()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_IMAGE");
}

#[tokio::test]
async fn test_embed_oversized_upload() {
    let config = Config {
        max_file_size_mb: 0,
        ..Config::default()
    };
    let state = AppState::new(&config, None).unwrap();
    let app = create_router_with_state(&config, state);

    let parts = embed_parts(random_png(64, 64, 8), "4", "[0, 1, 0, 1]", None);
    let response = app.oneshot(multipart_request("/embed", &parts)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// Extract Tests
// ============================================================================

#[tokio::test]
async fn test_extract_without_decoder_is_unavailable() {
    let parts: Vec<Part<'static>> =
        vec![("image", Some(("cover.png", "image/png")), random_png(64, 64, 9))];
    let response = create_router()
        .oneshot(multipart_request("/extract", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "DECODER_NOT_READY");
}

#[tokio::test]
async fn test_embed_then_extract_round_trip() {
    let app = create_decoding_app();
    let bits_json = alternating_json(BITS);

    let parts = embed_parts(random_png(256, 256, 10), "64", &bits_json, Some("haar"));
    let response = app
        .clone()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let marked = body_bytes(response).await;

    let parts: Vec<Part<'static>> = vec![
        ("image", Some(("watermarked_image.png", "image/png")), marked),
        ("wavelet_type", None, b"haar".to_vec()),
    ];
    let response = app
        .oneshot(multipart_request("/extract", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let decoded: Vec<u8> = serde_json::from_value(json["decoded_watermark"].clone()).unwrap();
    let expected: Vec<u8> = serde_json::from_str(&bits_json).unwrap();
    assert_eq!(decoded, expected);
}

#[tokio::test]
async fn test_extract_any_resolution_returns_full_payload() {
    let app = create_decoding_app();

    for (width, height, seed) in [
        (40, 30, 11),
        (700, 300, 12),
        (2000, 300, 14),
        (512, 80, 15),
        (1000, 20, 16),
        (300, 2, 17),
    ] {
        let parts: Vec<Part<'static>> = vec![(
            "image",
            Some(("photo.png", "image/png")),
            random_png(width, height, seed),
        )];
        let response = app
            .clone()
            .oneshot(multipart_request("/extract", &parts))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{}x{}", width, height);
        let json = body_json(response).await;
        let decoded = json["decoded_watermark"].as_array().unwrap();
        assert_eq!(decoded.len(), BITS);
        assert!(decoded.iter().all(|b| b == 0 || b == 1));
    }
}

/// Embed `bits_json` into a random cover through `/embed`, returning the PNG bytes.
async fn embed_through_api(app: &Router, width: u32, height: u32, bits_json: &str) -> Vec<u8> {
    let parts = embed_parts(random_png(width, height, 20), "64", bits_json, None);
    let response = app
        .clone()
        .oneshot(multipart_request("/embed", &parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await
}

async fn extract_through_api(app: &Router, png: Vec<u8>) -> Vec<u8> {
    let parts: Vec<Part<'static>> = vec![("image", Some(("copy.png", "image/png")), png)];
    let response = app
        .clone()
        .oneshot(multipart_request("/extract", &parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    serde_json::from_value(json["decoded_watermark"].clone()).unwrap()
}

#[tokio::test]
async fn test_extract_after_non_dyadic_resize() {
    let app = create_decoding_app();
    let bits_json = alternating_json(BITS);
    let expected: Vec<u8> = serde_json::from_str(&bits_json).unwrap();

    let marked = load_rgb(&embed_through_api(&app, 256, 256, &bits_json).await).unwrap();
    for (size, filter) in [
        (300, FilterType::Triangle),
        (384, FilterType::Triangle),
        (300, FilterType::Lanczos3),
    ] {
        let resized = imageops::resize(&marked, size, size, filter);
        let decoded = extract_through_api(&app, encode_png(&resized).unwrap()).await;
        let errors = decoded.iter().zip(&expected).filter(|(a, b)| a != b).count();
        assert!(errors <= 1, "{} {:?}: {} bit errors", size, filter, errors);
    }
}

#[tokio::test]
async fn test_panorama_round_trip() {
    let app = create_decoding_app();
    let bits_json = alternating_json(BITS);
    let expected: Vec<u8> = serde_json::from_str(&bits_json).unwrap();

    let marked = embed_through_api(&app, 2000, 300, &bits_json).await;
    assert_eq!(load_rgb(&marked).unwrap().dimensions(), (2000, 300));
    assert_eq!(extract_through_api(&app, marked).await, expected);
}

#[test]
fn test_router_config_rejects_invalid_settings() {
    assert!(create_router_with_config(&Config::default()).is_ok());

    let bad_strength = Config {
        embed_strength: -1.0,
        ..Config::default()
    };
    assert!(create_router_with_config(&bad_strength).is_err());

    let bad_frame = Config {
        frame_edge: 7,
        ..Config::default()
    };
    assert!(create_router_with_config(&bad_frame).is_err());
}

#[tokio::test]
async fn test_extract_unsupported_wavelet() {
    let parts: Vec<Part<'static>> = vec![
        ("image", Some(("cover.png", "image/png")), random_png(64, 64, 13)),
        ("wavelet_type", None, b"sym4".to_vec()),
    ];
    let response = create_decoding_app()
        .oneshot(multipart_request("/extract", &parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
