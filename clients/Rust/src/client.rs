use crate::error::{RemipError, Result};
use crate::sse::{Frame, FrameParser};
use crate::types::{Problem, Solution, SolutionStatus, SolverEvent};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, Url};
use tokio::sync::mpsc::UnboundedSender;

/// HTTP client for a ReMIP solver server
#[derive(Debug, Clone)]
pub struct RemipClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    stream: bool,
}

impl RemipClient {
    /// Create a new ReMIP client in streaming mode
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the solver (e.g., "http://localhost:9000")
    ///
    /// # Example
    ///
    /// ```no_run
    /// use remip_client::RemipClient;
    ///
    /// let client = RemipClient::new("http://localhost:9000").unwrap();
    /// ```
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new ReMIP client with a custom reqwest client
    ///
    /// This allows you to configure timeouts, proxies, etc.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url =
            Url::parse(base_url.as_ref()).map_err(|e| RemipError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
            stream: true,
        })
    }

    /// Set the API key sent as `X-API-Key`
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Choose between the event-stream and the plain JSON response mode
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check the health of the solver server
    pub async fn health_check(&self) -> Result<bool> {
        let url = self
            .base_url
            .join("/health")
            .map_err(|e| RemipError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        Ok(response.status().is_success())
    }

    /// Submit a problem and wait for its terminal solution
    ///
    /// `timeout_seconds` is forwarded to the solver, which owns the `timeout`
    /// status; no local deadline is applied. In streaming mode `log`, `metric`
    /// and `status` frames are sent to `events` in arrival order.
    ///
    /// Returns `Ok(None)` when a stream ends without a `result` frame.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use remip_client::{Problem, RemipClient};
    /// # async fn example(problem: Problem) -> Result<(), Box<dyn std::error::Error>> {
    /// let client = RemipClient::new("http://localhost:9000")?;
    /// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    ///
    /// let solution = client.solve(&problem, Some(60), Some(&tx)).await?;
    /// drop(tx);
    /// while let Some(event) = rx.recv().await {
    ///     println!("{:?}", event);
    /// }
    /// println!("{:?}", solution);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn solve(
        &self,
        problem: &Problem,
        timeout_seconds: Option<u64>,
        events: Option<&UnboundedSender<SolverEvent>>,
    ) -> Result<Option<Solution>> {
        let url = self.solve_url(timeout_seconds)?;
        log::debug!("[remip] POST {url}");

        let response = self.post(url, problem).await?;
        if self.stream {
            parse_stream(response, events).await
        } else {
            parse_plain(response).await.map(Some)
        }
    }

    fn solve_url(&self, timeout_seconds: Option<u64>) -> Result<Url> {
        let mut url = self
            .base_url
            .join("/solve")
            .map_err(|e| RemipError::InvalidUrl(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            if self.stream {
                query.append_pair("stream", "sse");
            }
            if let Some(timeout) = timeout_seconds {
                query.append_pair("timeout", &timeout.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    async fn post(&self, url: Url, problem: &Problem) -> Result<Response> {
        let mut req_builder = self.client.post(url).json(problem);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("X-API-Key", api_key);
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(match status.as_u16() {
                401 | 403 => RemipError::AuthenticationFailed,
                code => RemipError::ApiError { status: code, body },
            });
        }

        Ok(response)
    }
}

async fn parse_plain(response: Response) -> Result<Solution> {
    let body = response.bytes().await?;
    if body.is_empty() {
        return Err(RemipError::EmptyBody);
    }

    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| RemipError::ParseError(e.to_string()))?;
    Solution::from_payload(payload, None)
}

async fn parse_stream(
    response: Response,
    events: Option<&UnboundedSender<SolverEvent>>,
) -> Result<Option<Solution>> {
    if response.status() == StatusCode::NO_CONTENT {
        return Err(RemipError::EmptyBody);
    }
    let mut body = response.bytes_stream();
    let mut parser = FrameParser::new();
    let mut state = StreamState::default();
    let mut received = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        received += chunk.len();
        for frame in parser.feed(&chunk) {
            state.apply(frame, events);
        }
    }
    if received == 0 {
        return Err(RemipError::EmptyBody);
    }
    for frame in parser.finish() {
        state.apply(frame, events);
    }

    if state.result.is_none() {
        log::warn!("[remip] stream ended without a result frame");
    }
    Ok(state.result)
}

#[derive(Debug, Default)]
struct StreamState {
    result: Option<Solution>,
    last_status: Option<SolutionStatus>,
}

impl StreamState {
    fn apply(&mut self, frame: Frame, events: Option<&UnboundedSender<SolverEvent>>) {
        let event = match frame {
            Frame::Log(data) => SolverEvent::Log(data),
            Frame::Metric(data) => SolverEvent::Metric(data),
            Frame::Status(data) => {
                if let Some(status) = data
                    .get("status")
                    .and_then(|s| s.as_str())
                    .and_then(SolutionStatus::parse)
                {
                    self.last_status = Some(status);
                }
                SolverEvent::Status(data)
            }
            Frame::Result(data) => {
                if self.result.is_some() {
                    log::warn!("[remip] ignoring additional result frame");
                    return;
                }
                match Solution::from_payload(data, self.last_status) {
                    Ok(solution) => self.result = Some(solution),
                    Err(e) => log::warn!("[remip] skipping unreadable result frame: {e}"),
                }
                return;
            }
            Frame::Other { event, .. } => {
                log::debug!("[remip] ignoring {event} frame");
                return;
            }
        };

        if let Some(tx) = events {
            // a caller that stopped listening does not abort the solve
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = RemipClient::new("http://localhost:9000");
        assert!(client.is_ok());
        assert!(client.unwrap().is_streaming());
    }

    #[test]
    fn test_client_with_api_key() {
        let client = RemipClient::new("http://localhost:9000")
            .unwrap()
            .with_api_key("test-key");
        assert_eq!(client.api_key, Some("test-key".to_string()));
    }

    #[test]
    fn test_invalid_url() {
        let client = RemipClient::new("not a valid url");
        assert!(client.is_err());
    }

    #[test]
    fn test_solve_url_streaming_with_timeout() {
        let client = RemipClient::new("http://localhost:9000").unwrap();
        let url = client.solve_url(Some(30)).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/solve?stream=sse&timeout=30");
    }

    #[test]
    fn test_solve_url_plain_without_timeout() {
        let client = RemipClient::new("http://localhost:9000")
            .unwrap()
            .with_streaming(false);
        let url = client.solve_url(None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/solve");
    }

    #[test]
    fn test_stream_state_forwards_telemetry_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut state = StreamState::default();

        state.apply(Frame::Log(json!({"message": "start"})), Some(&tx));
        state.apply(Frame::Metric(json!({"gap": 0.1})), Some(&tx));
        state.apply(
            Frame::Result(json!({"status": "optimal", "objective_value": 10, "variables": {"x": 5}})),
            Some(&tx),
        );

        assert_eq!(rx.try_recv().unwrap(), SolverEvent::Log(json!({"message": "start"})));
        assert_eq!(rx.try_recv().unwrap(), SolverEvent::Metric(json!({"gap": 0.1})));
        assert!(rx.try_recv().is_err());

        let solution = state.result.unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.objective_value, Some(10.0));
        assert_eq!(solution.variables.get("x"), Some(&5.0));
    }

    #[test]
    fn test_stream_state_keeps_first_result() {
        let mut state = StreamState::default();
        state.apply(Frame::Result(json!({"status": "infeasible"})), None);
        state.apply(Frame::Result(json!({"status": "optimal", "objective_value": 1})), None);
        assert_eq!(state.result.unwrap().status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_stream_state_applies_status_frame_to_result() {
        let mut state = StreamState::default();
        state.apply(Frame::Status(json!({"status": "timeout"})), None);
        state.apply(Frame::Result(json!({"objective_value": 7, "variables": {}})), None);
        assert_eq!(state.result.unwrap().status, SolutionStatus::Timeout);
    }
}
