use atc_contracts::{decode_snapshot, SimulationConfig, SimulationSnapshot};
use serde_json::{json, Map, Value};

use crate::{
    ClientConfig, ConfigError, EngineRequest, HttpTransport, RawResponse, RemoteError, Routes,
    SyncError, Transport,
};

/// Issues reset, step and state calls against the engine and returns a
/// decoded snapshot or one of the four [`SyncError`] kinds.
///
/// Every call is a single attempt. A step that times out may still have
/// advanced the engine, so retrying is left to the caller.
#[derive(Debug)]
pub struct SimulationClient<T = HttpTransport> {
    transport: T,
    routes: Routes,
}

impl SimulationClient<HttpTransport> {
    pub fn connect(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(transport, config.routes.clone()))
    }
}

impl<T: Transport> SimulationClient<T> {
    pub fn with_transport(transport: T, routes: Routes) -> Self {
        Self { transport, routes }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Discards all engine state and starts over from `config` at step 0.
    pub async fn reset(&self, config: &SimulationConfig) -> Result<SimulationSnapshot, SyncError> {
        if let Some((field, value)) = config.numeric_violation() {
            return Err(SyncError::invalid_argument(
                field,
                format!("must be a non-negative finite number, got {value}"),
            ));
        }

        let body = serde_json::to_value(config)
            .map_err(|err| SyncError::invalid_argument("config", err.to_string()))?;

        self.execute(EngineRequest::post(&self.routes.reset).with_body(body))
            .await
    }

    /// Advances the engine by `count` steps. Counts below 1 are rejected
    /// without contacting the engine.
    pub async fn step(&self, count: i64) -> Result<SimulationSnapshot, SyncError> {
        if count < 1 {
            return Err(SyncError::invalid_argument(
                "count",
                format!("step count must be at least 1, got {count}"),
            ));
        }

        self.execute(EngineRequest::post(&self.routes.step).with_query("steps", count))
            .await
    }

    pub async fn step_once(&self) -> Result<SimulationSnapshot, SyncError> {
        self.step(1).await
    }

    /// Reads the current snapshot without advancing the engine.
    pub async fn get_state(&self) -> Result<SimulationSnapshot, SyncError> {
        self.execute(EngineRequest::get(&self.routes.state)).await
    }

    async fn execute(&self, request: EngineRequest) -> Result<SimulationSnapshot, SyncError> {
        let label = request.to_string();
        log::debug!("{label}");

        let response = self.transport.send(request).await.map_err(|err| {
            log::warn!("{label} transport failure: {err}");
            err
        })?;
        log::debug!("{label} -> {} ({} bytes)", response.status, response.body.len());

        let payload = normalize_response(response).map_err(|err| {
            log::warn!("{label} rejected: {err}");
            err
        })?;

        Ok(decode_snapshot(&payload)?)
    }
}

/// Turns a raw engine response into structured data.
///
/// Empty bodies become `{}`, bodies that are not JSON become
/// `{"detail": <text>}`, and any non-success status becomes a
/// [`RemoteError`] carrying those fields.
pub fn normalize_response(response: RawResponse) -> Result<Value, RemoteError> {
    let success = response.is_success();
    let RawResponse { status, body } = response;
    let payload = parse_body(body);

    if !success {
        return Err(RemoteError::from_payload(status, payload));
    }

    Ok(payload)
}

fn parse_body(body: String) -> Value {
    if body.is_empty() {
        return Value::Object(Map::new());
    }

    match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(_) => json!({ "detail": body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_error_body_keeps_status() {
        let err = normalize_response(RawResponse::new(500, "")).expect_err("500 is a failure");
        assert_eq!(err.status, 500);
        assert!(err.fields.is_empty());
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn text_error_body_becomes_detail() {
        let err = normalize_response(RawResponse::new(502, "Bad Gateway"))
            .expect_err("502 is a failure");
        assert_eq!(err.detail().as_deref(), Some("Bad Gateway"));
        assert_eq!(err.to_string(), "engine responded with status 502: Bad Gateway");
    }

    #[test]
    fn json_error_body_is_kept_whole() {
        let err = normalize_response(RawResponse::new(
            409,
            r#"{"detail":"not initialized","message":"call reset first","code":17}"#,
        ))
        .expect_err("409 is a failure");

        assert_eq!(err.detail().as_deref(), Some("not initialized"));
        assert_eq!(err.message().as_deref(), Some("call reset first"));
        assert_eq!(err.fields.get("code"), Some(&json!(17)));
    }

    #[test]
    fn structured_detail_is_rendered_as_text() {
        let err = normalize_response(RawResponse::new(
            422,
            r#"{"detail":[{"loc":["body","scenario"],"msg":"invalid"}]}"#,
        ))
        .expect_err("422 is a failure");

        let detail = err.detail().expect("detail present");
        assert!(detail.contains("scenario"));
    }

    #[test]
    fn non_object_json_error_is_wrapped() {
        let err = normalize_response(RawResponse::new(400, r#""bad steps""#))
            .expect_err("400 is a failure");
        assert_eq!(err.detail().as_deref(), Some("bad steps"));
    }

    #[test]
    fn success_text_body_is_wrapped_for_decoding() {
        let payload = normalize_response(RawResponse::new(200, "ok")).expect("200 is success");
        assert_eq!(payload, json!({ "detail": "ok" }));
    }
}
