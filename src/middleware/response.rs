use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

/// Normalizes every /api response into the `{ success, data | error }`
/// envelope so callers never have to branch on shape.
pub async fn wrap_response_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let res = next.run(req).await;

    if !path.starts_with("/api") {
        return Ok(res);
    }

    let status = res.status();

    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map_or(false, |ct| ct.contains("application/json"));

    let (mut parts, body) = res.into_parts();

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let wrapped = if is_json {
        let data: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        // Error bodies already carry the envelope (see error.rs).
        match data.as_object() {
            Some(obj) if obj.contains_key("success") => data,
            _ => {
                if status.is_success() {
                    json!({ "success": true, "data": data })
                } else {
                    json!({
                        "success": false,
                        "error": data
                            .as_str()
                            .or(data.get("error").and_then(|v| v.as_str()))
                            .unwrap_or(&status.to_string())
                    })
                }
            }
        }
    } else {
        let msg = String::from_utf8_lossy(&bytes).to_string();
        if status.is_success() {
            if msg.is_empty() {
                json!({ "success": true, "data": null })
            } else {
                json!({ "success": true, "data": msg })
            }
        } else {
            json!({
                "success": false,
                "error": if msg.is_empty() { status.to_string() } else { msg }
            })
        }
    };

    let new_bytes = serde_json::to_vec(&wrapped).unwrap();

    parts.headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    parts.headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from_str(&new_bytes.len().to_string()).unwrap(),
    );

    Ok(Response::from_parts(parts, Body::from(new_bytes)))
}
