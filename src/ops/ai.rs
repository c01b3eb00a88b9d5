// ============================================================================
// AI OPERATIONS: generative inpainting service client
// ============================================================================
//
// The service is an opaque HTTP endpoint: it takes the canonical square, a
// mask and a prompt, and answers with one edited square image. Requests run
// on a worker thread and report back over a channel; the owning project
// polls, merges and enforces its own deadline.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::InpaintError;
use crate::io;
use crate::ops::inpaint::InpaintRequest;

// -- Wire format ------------------------------------------------------------

/// JSON body sent to the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InpaintPayload {
    pub full_image_data_url: String,
    pub mask_image_data_url: String,
    pub prompt: String,
    pub style: String,
}

impl InpaintPayload {
    /// PNG-encode both images of a request.
    pub fn from_request(request: &InpaintRequest) -> Result<Self, InpaintError> {
        Self::encode(&request.full_image, &request.mask, &request.prompt, &request.style)
    }

    pub fn encode(
        full_image: &RgbaImage,
        mask: &RgbaImage,
        prompt: &str,
        style: &str,
    ) -> Result<Self, InpaintError> {
        let full_image_data_url = io::encode_png_data_url(full_image)
            .map_err(|e| InpaintError::Network(format!("could not encode image: {e}")))?;
        let mask_image_data_url = io::encode_png_data_url(mask)
            .map_err(|e| InpaintError::Network(format!("could not encode mask: {e}")))?;
        Ok(Self {
            full_image_data_url,
            mask_image_data_url,
            prompt: prompt.to_string(),
            style: style.to_string(),
        })
    }
}

/// JSON body returned by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InpaintReply {
    pub success: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InpaintReply {
    /// The image link of a successful reply, or the service error.
    pub fn into_image_url(self, status: u16) -> Result<String, InpaintError> {
        match (self.success, self.image_url) {
            (true, Some(url)) if !url.trim().is_empty() => Ok(url),
            (true, _) => Err(InpaintError::Decode("reply has no imageUrl".to_string())),
            (false, _) => Err(InpaintError::Service {
                status,
                message: self.error.unwrap_or_else(|| "success=false".to_string()),
            }),
        }
    }
}

// -- Service seam -----------------------------------------------------------

/// One blocking inpaint round trip. Implementations must not touch any
/// editor state; they only turn a payload into a decoded square image.
pub trait InpaintService: Send + Sync {
    fn inpaint(&self, payload: &InpaintPayload) -> Result<RgbaImage, InpaintError>;
}

/// HTTP implementation against the JSON contract above.
pub struct HttpInpaintService {
    client: reqwest::blocking::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpInpaintService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, InpaintError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InpaintError::Network(e.to_string()))?;
        Ok(Self { client, endpoint: endpoint.into(), timeout })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, e: reqwest::Error) -> InpaintError {
        if e.is_timeout() {
            InpaintError::Timeout(self.timeout)
        } else if e.is_decode() {
            InpaintError::Decode(e.to_string())
        } else {
            InpaintError::Network(e.to_string())
        }
    }

    fn fetch_image(&self, url: &str) -> Result<RgbaImage, InpaintError> {
        if io::is_data_url(url) {
            return Ok(io::decode_data_url(url)?);
        }
        let response = self.client.get(url).send().map_err(|e| self.map_err(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(InpaintError::Service {
                status: status.as_u16(),
                message: format!("image download failed: {url}"),
            });
        }
        let bytes = response.bytes().map_err(|e| self.map_err(e))?;
        Ok(io::decode_image_bytes(&bytes)?)
    }
}

impl InpaintService for HttpInpaintService {
    fn inpaint(&self, payload: &InpaintPayload) -> Result<RgbaImage, InpaintError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .map_err(|e| self.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<InpaintReply>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(InpaintError::Service { status: status.as_u16(), message });
        }

        let reply: InpaintReply = response.json().map_err(|e| self.map_err(e))?;
        let url = reply.into_image_url(status.as_u16())?;
        self.fetch_image(&url)
    }
}

// -- Background job ---------------------------------------------------------

type JobResult = Result<RgbaImage, InpaintError>;

/// A request in flight on a worker thread.
///
/// Dropping the job (or calling [`InpaintJob::cancel`]) abandons it: the
/// worker keeps running to completion but its result goes nowhere. A result
/// the worker finished after the deadline is never handed out, however late
/// the host polls.
pub struct InpaintJob {
    /// Result plus the instant the worker finished it.
    receiver: Receiver<(Instant, JobResult)>,
    started: Instant,
    timeout: Duration,
}

/// Outcome of polling a job.
#[derive(Debug)]
pub enum JobStatus {
    Pending,
    Done(JobResult),
}

impl InpaintJob {
    /// Encode and send `request` on a new worker thread.
    pub fn spawn(
        service: Arc<dyn InpaintService>,
        request: &InpaintRequest,
        timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let full_image = request.full_image.clone();
        let mask = request.mask.clone();
        let prompt = request.prompt.clone();
        let style = request.style.clone();

        std::thread::spawn(move || {
            let result = InpaintPayload::encode(&full_image, &mask, &prompt, &style)
                .and_then(|payload| service.inpaint(&payload));
            // Receiver is gone when the job was cancelled or timed out.
            let _ = tx.send((Instant::now(), result));
        });

        Self { receiver: rx, started: Instant::now(), timeout }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non-blocking check. Reports [`InpaintError::Timeout`] once the
    /// deadline passes even if the worker is still busy.
    pub fn poll(&self) -> JobStatus {
        match self.receiver.try_recv() {
            Ok((finished, result)) => JobStatus::Done(self.accept(finished, result)),
            Err(TryRecvError::Empty) if self.started.elapsed() >= self.timeout => {
                JobStatus::Done(Err(InpaintError::Timeout(self.timeout)))
            }
            Err(TryRecvError::Empty) => JobStatus::Pending,
            Err(TryRecvError::Disconnected) => {
                JobStatus::Done(Err(InpaintError::Network("inpaint worker exited".to_string())))
            }
        }
    }

    /// Block until the job finishes or its deadline passes.
    pub fn wait(self) -> Result<RgbaImage, InpaintError> {
        let remaining = self.timeout.saturating_sub(self.started.elapsed());
        match self.receiver.recv_timeout(remaining) {
            Ok((finished, result)) => self.accept(finished, result),
            Err(RecvTimeoutError::Timeout) => Err(InpaintError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(InpaintError::Network("inpaint worker exited".to_string()))
            }
        }
    }

    pub fn cancel(self) {
        log::info!("Inpaint job abandoned after {:?}", self.started.elapsed());
    }

    /// Results finished past the deadline count as timeouts.
    fn accept(&self, finished: Instant, result: JobResult) -> JobResult {
        if finished.saturating_duration_since(self.started) > self.timeout {
            log::warn!(
                "Inpaint result arrived {:?} after start, past the {:?} deadline; discarded",
                finished.saturating_duration_since(self.started),
                self.timeout
            );
            return Err(InpaintError::Timeout(self.timeout));
        }
        result.map_err(|e| self.normalize(e))
    }

    fn normalize(&self, e: InpaintError) -> InpaintError {
        match e {
            InpaintError::Timeout(_) => InpaintError::Timeout(self.timeout),
            other => other,
        }
    }
}
