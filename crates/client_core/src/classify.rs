use std::{iter, time::Instant};

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use serde::de::IgnoredAny;
use shared::{
    domain::{ClassificationResult, Prediction, Provenance},
    error::ClassificationError,
    protocol::{
        Base64ClassifyRequest, ErrorBody, FlatPrediction, PredictEnvelope, ProbabilitiesOnly,
        ProbabilityMap,
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::{ServiceConfig, SubmitMode},
    ranking::rank,
    validation::UploadedImage,
};

/// Submits images to the classification service and normalizes whatever
/// prediction shape comes back. Failures are reported, never replaced by
/// simulated results.
#[derive(Debug, Clone)]
pub struct ClassificationClient {
    http: Client,
    classify_url: Url,
    base64_url: Url,
    upload_field: String,
    submit_mode: SubmitMode,
}

impl ClassificationClient {
    pub fn new(http: Client, config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            http,
            classify_url: config.classify_url()?,
            base64_url: config.base64_url()?,
            upload_field: config.upload_field.clone(),
            submit_mode: config.submit_mode,
        })
    }

    pub async fn classify(
        &self,
        image: &UploadedImage,
    ) -> Result<ClassificationResult, ClassificationError> {
        match self.submit_mode {
            SubmitMode::Multipart => self.classify_multipart(image).await,
            SubmitMode::Base64Json => self.classify_base64(image).await,
        }
    }

    pub async fn classify_multipart(
        &self,
        image: &UploadedImage,
    ) -> Result<ClassificationResult, ClassificationError> {
        let part = Part::stream_with_length(image.content_bytes(), image.size_bytes())
            .file_name(image.file_name().to_string())
            .mime_str(image.mime_type())
            .map_err(|err| {
                ClassificationError::validation(format!(
                    "Unsupported image type '{}': {err}",
                    image.mime_type()
                ))
            })?;
        let form = Form::new().part(self.upload_field.clone(), part);
        let request = self.http.post(self.classify_url.clone()).multipart(form);
        self.submit(request, &self.classify_url, image).await
    }

    pub async fn classify_base64(
        &self,
        image: &UploadedImage,
    ) -> Result<ClassificationResult, ClassificationError> {
        let body = Base64ClassifyRequest {
            image: STANDARD.encode(image.content()),
        };
        let request = self.http.post(self.base64_url.clone()).json(&body);
        self.submit(request, &self.base64_url, image).await
    }

    async fn submit(
        &self,
        request: RequestBuilder,
        url: &Url,
        image: &UploadedImage,
    ) -> Result<ClassificationResult, ClassificationError> {
        let started = Instant::now();
        debug!(
            url = %url,
            file = image.file_name(),
            size_bytes = image.size_bytes(),
            "classify: submitting image"
        );

        let response = request.send().await.map_err(|err| {
            warn!(url = %url, error = %err, "classify: transport failure");
            ClassificationError::network(err.to_string())
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| {
            warn!(url = %url, error = %err, "classify: failed reading response body");
            ClassificationError::network(err.to_string())
        })?;

        if !status.is_success() {
            let error_body = serde_json::from_slice::<ErrorBody>(&body).unwrap_or_default();
            let message = error_body
                .message
                .clone()
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            warn!(
                url = %url,
                status = status.as_u16(),
                message = %message,
                "classify: service returned error status"
            );
            return Err(ClassificationError::server(
                status.as_u16(),
                error_body.code_text(),
                message,
            ));
        }

        let predictions = normalize(status.as_u16(), &body).inspect_err(|err| {
            warn!(url = %url, error = %err, "classify: response not understood");
        })?;
        let result = ClassificationResult::new(predictions, Provenance::Remote);
        info!(
            url = %url,
            primary = result.primary().map(|p| p.label.as_str()).unwrap_or_default(),
            confidence = result.confidence(),
            alternatives = result.alternatives().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "classify: prediction received"
        );
        Ok(result)
    }
}

/// Interprets a 2xx body, trying the envelope shape (whose `data` may be flat
/// or a bare mapping), then the flat shape, then a bare probability mapping. The body is decoded from bytes for every
/// attempt so mapping order survives for tie-breaking.
pub(crate) fn normalize(status: u16, body: &[u8]) -> Result<Vec<Prediction>, ClassificationError> {
    if serde_json::from_slice::<serde_json::Value>(body).is_err() {
        return Err(ClassificationError::schema("response body is not JSON"));
    }

    if let Ok(envelope) = serde_json::from_slice::<PredictEnvelope<IgnoredAny>>(body) {
        if !envelope.success {
            let message = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "Classification failed".to_string());
            return Err(ClassificationError::server(status, None, message));
        }
        match serde_json::from_slice::<PredictEnvelope<FlatPrediction>>(body) {
            Ok(PredictEnvelope {
                data: Some(data), ..
            }) => {
                if let Some(predictions) = from_flat(data) {
                    return Ok(predictions);
                }
            }
            // `data` without a class name may still carry a bare mapping.
            _ => {
                if let Ok(PredictEnvelope {
                    data: Some(data), ..
                }) = serde_json::from_slice::<PredictEnvelope<ProbabilitiesOnly>>(body)
                {
                    if let Some(predictions) = from_mapping(&data.probabilities) {
                        return Ok(predictions);
                    }
                }
            }
        }
    }

    if let Ok(flat) = serde_json::from_slice::<FlatPrediction>(body) {
        if let Some(predictions) = from_flat(flat) {
            return Ok(predictions);
        }
    }

    if let Ok(only) = serde_json::from_slice::<ProbabilitiesOnly>(body) {
        if let Some(predictions) = from_mapping(&only.probabilities) {
            return Ok(predictions);
        }
    }

    Err(ClassificationError::schema(
        "response matched none of the known prediction shapes",
    ))
}

fn from_flat(flat: FlatPrediction) -> Option<Vec<Prediction>> {
    let class_name = flat.class_name.trim();
    if class_name.is_empty() || !is_probability(flat.confidence) {
        return None;
    }
    let mapping = flat.probabilities.unwrap_or_default();
    if !mapping.iter().all(|(_, p)| is_probability(p)) {
        return None;
    }

    let entries = mapping
        .iter()
        .filter(|(label, _)| *label != class_name)
        .chain(iter::once((class_name, flat.confidence)));
    Some(rank(entries, Some(class_name)))
}

fn from_mapping(mapping: &ProbabilityMap) -> Option<Vec<Prediction>> {
    if mapping.is_empty() || !mapping.iter().all(|(_, p)| is_probability(p)) {
        return None;
    }
    let mut top: Option<(&str, f64)> = None;
    for (label, probability) in mapping.iter() {
        if top.map_or(true, |(_, best)| probability > best) {
            top = Some((label, probability));
        }
    }
    let (primary, _) = top?;
    Some(rank(mapping.iter(), Some(primary)))
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
#[path = "tests/classify_tests.rs"]
mod tests;
