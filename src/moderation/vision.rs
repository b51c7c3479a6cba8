//! Image classifier client and tiered image acquisition.
//!
//! A photo reference is an opaque locator owned by the storage service. We
//! try an ordered list of acquisition strategies and stop at the first one
//! that yields a classification; if every strategy fails the caller gets a
//! default (all very-unlikely, no labels) annotation, never an error.

use std::time::Duration;

use anyhow::{bail, Context as _};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{StorageConfig, VisionConfig};
use crate::metrics::MODERATION_IMAGE_UNAVAILABLE;

use super::{SafetyLikelihoods, SemanticLabel};

/// Maximum number of labels requested from the classifier.
const MAX_LABELS: u32 = 10;

/// A classified image: safety likelihoods plus semantic labels.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub safety: SafetyLikelihoods,
    pub labels: Vec<SemanticLabel>,
}

/// How to hand the image to the classifier.
enum ImageSource {
    Bytes(Vec<u8>),
    Uri(String),
}

/// One attempt at getting the image classified.
enum Strategy {
    /// Download the image from a public URL, then classify the bytes.
    Download(String),
    /// Ask the classifier to fetch the URL itself, without relaying bytes.
    Reference(String),
    /// Download through the storage API with a bearer token, then classify.
    AuthenticatedDownload(String),
}

impl Strategy {
    fn describe(&self) -> String {
        match self {
            Self::Download(url) => format!("public download {url}"),
            Self::Reference(url) => format!("by-reference {url}"),
            Self::AuthenticatedDownload(url) => format!("authenticated download {url}"),
        }
    }
}

/// Client for the image safety/label classifier.
pub struct VisionClient {
    client: reqwest::Client,
    vision: VisionConfig,
    storage: StorageConfig,
}

impl VisionClient {
    pub fn new(client: reqwest::Client, vision: VisionConfig, storage: StorageConfig) -> Self {
        Self {
            client,
            vision,
            storage,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.vision.timeout_secs)
    }

    /// The ordered acquisition chain for an opaque photo reference.
    fn strategies(&self, reference: &str) -> Vec<Strategy> {
        let mut strategies: Vec<Strategy> = self
            .storage
            .public_url_templates
            .iter()
            .map(|t| Strategy::Download(t.replace("{ref}", reference)))
            .collect();
        if let Some(template) = self.storage.public_url_templates.first() {
            strategies.push(Strategy::Reference(template.replace("{ref}", reference)));
        }
        if let (Some(base), Some(_)) = (&self.storage.api_base, &self.storage.token) {
            strategies.push(Strategy::AuthenticatedDownload(format!(
                "{}/{reference}",
                base.trim_end_matches('/')
            )));
        }
        strategies
    }

    /// Classify an opaque photo reference, degrading to a default annotation
    /// when the image cannot be reached or classified.
    #[tracing::instrument(skip_all)]
    pub async fn classify_reference(&self, reference: &str) -> Annotation {
        for strategy in self.strategies(reference) {
            match self.attempt(&strategy).await {
                Ok(annotation) => return annotation,
                Err(err) => {
                    debug!("image strategy failed ({}): {err:#}", strategy.describe());
                }
            }
        }

        warn!("all image acquisition strategies failed, moderating text only");
        metrics::counter!(MODERATION_IMAGE_UNAVAILABLE).increment(1);
        Annotation::default()
    }

    async fn attempt(&self, strategy: &Strategy) -> anyhow::Result<Annotation> {
        let source = match strategy {
            Strategy::Download(url) => ImageSource::Bytes(self.download(url, None).await?),
            Strategy::Reference(url) => ImageSource::Uri(url.clone()),
            Strategy::AuthenticatedDownload(url) => {
                ImageSource::Bytes(self.download(url, self.storage.token.as_deref()).await?)
            }
        };
        self.annotate(&source).await
    }

    async fn download(&self, url: &str, token: Option<&str>) -> anyhow::Result<Vec<u8>> {
        let mut req = self.client.get(url).timeout(self.timeout());
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req
            .send()
            .await
            .context("image download request failed")?
            .error_for_status()
            .context("image download returned an error status")?;
        let bytes = res.bytes().await.context("failed to read image body")?;
        if bytes.is_empty() {
            bail!("image download returned an empty body");
        }
        Ok(bytes.to_vec())
    }

    /// Call the classifier with either inline bytes or a URL reference.
    async fn annotate(&self, source: &ImageSource) -> anyhow::Result<Annotation> {
        let key = self
            .vision
            .api_key
            .as_deref()
            .context("no vision api key configured")?;

        let image = match source {
            ImageSource::Bytes(bytes) => {
                serde_json::json!({ "content": BASE64.encode(bytes) })
            }
            ImageSource::Uri(uri) => {
                serde_json::json!({ "source": { "imageUri": uri } })
            }
        };
        let body = serde_json::json!({
            "requests": [{
                "image": image,
                "features": [
                    { "type": "SAFE_SEARCH_DETECTION" },
                    { "type": "LABEL_DETECTION", "maxResults": MAX_LABELS },
                ],
            }],
        });

        let res = self
            .client
            .post(format!("{}?key={key}", self.vision.endpoint))
            .timeout(self.timeout())
            .json(&body)
            .send()
            .await
            .context("classifier request failed")?
            .error_for_status()
            .context("classifier returned an error status")?;

        let response: AnnotateResponse =
            res.json().await.context("invalid classifier response")?;
        into_annotation(response)
    }
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    #[serde(default)]
    safe_search_annotation: Option<SafetyLikelihoods>,
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelAnnotation {
    description: String,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

fn into_annotation(response: AnnotateResponse) -> anyhow::Result<Annotation> {
    let result = response
        .responses
        .into_iter()
        .next()
        .context("classifier returned no responses")?;
    if let Some(error) = result.error {
        bail!("classifier error: {}", error.message);
    }
    Ok(Annotation {
        safety: result.safe_search_annotation.unwrap_or_default(),
        labels: result
            .label_annotations
            .into_iter()
            .map(|l| SemanticLabel {
                description: l.description,
                score: l.score,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::Likelihood;

    #[test]
    fn parses_a_full_annotate_response() {
        let body = r#"{
            "responses": [{
                "safeSearchAnnotation": {
                    "adult": "VERY_UNLIKELY",
                    "spoof": "UNLIKELY",
                    "medical": "POSSIBLE",
                    "violence": "LIKELY",
                    "racy": "VERY_LIKELY"
                },
                "labelAnnotations": [
                    { "description": "Pothole", "score": 0.93 },
                    { "description": "Road surface", "score": 0.81 }
                ]
            }]
        }"#;
        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        let annotation = into_annotation(parsed).unwrap();
        assert_eq!(annotation.safety.adult, Likelihood::VeryUnlikely);
        assert_eq!(annotation.safety.violence, Likelihood::Likely);
        assert_eq!(annotation.safety.racy, Likelihood::VeryLikely);
        assert_eq!(annotation.labels.len(), 2);
        assert_eq!(annotation.labels[0].description, "Pothole");
        assert_eq!(annotation.labels[0].score, Some(0.93));
    }

    #[test]
    fn unknown_likelihood_defaults_to_very_unlikely() {
        let body = r#"{
            "responses": [{
                "safeSearchAnnotation": {
                    "adult": "UNKNOWN",
                    "spoof": "UNKNOWN",
                    "medical": "UNKNOWN",
                    "violence": "UNKNOWN",
                    "racy": "UNKNOWN"
                }
            }]
        }"#;
        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        let annotation = into_annotation(parsed).unwrap();
        assert_eq!(annotation.safety.adult, Likelihood::VeryUnlikely);
        assert!(annotation.labels.is_empty());
    }

    #[test]
    fn classifier_error_becomes_a_failed_attempt() {
        let body = r#"{ "responses": [{ "error": { "message": "invalid image" } }] }"#;
        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        assert!(into_annotation(parsed).is_err());
    }

    fn client_with(storage: StorageConfig) -> VisionClient {
        VisionClient::new(reqwest::Client::new(), VisionConfig::default(), storage)
    }

    #[test]
    fn strategies_try_downloads_then_reference_then_authenticated() {
        let client = client_with(StorageConfig {
            public_url_templates: vec![
                "https://img.example.com/{ref}?alt=media".to_owned(),
                "https://cdn.example.com/photos/{ref}".to_owned(),
            ],
            api_base: Some("https://storage.example.com/v1/photos/".to_owned()),
            token: Some("secret".to_owned()),
        });

        let strategies = client.strategies("abc123");
        assert_eq!(strategies.len(), 4);
        assert!(matches!(&strategies[0],
            Strategy::Download(url) if url == "https://img.example.com/abc123?alt=media"));
        assert!(matches!(&strategies[1],
            Strategy::Download(url) if url == "https://cdn.example.com/photos/abc123"));
        assert!(matches!(&strategies[2],
            Strategy::Reference(url) if url == "https://img.example.com/abc123?alt=media"));
        assert!(matches!(&strategies[3],
            Strategy::AuthenticatedDownload(url) if url == "https://storage.example.com/v1/photos/abc123"));
    }

    #[test]
    fn authenticated_download_needs_both_base_and_token() {
        let client = client_with(StorageConfig {
            public_url_templates: Vec::new(),
            api_base: Some("https://storage.example.com/v1/photos".to_owned()),
            token: None,
        });
        assert!(client.strategies("abc123").is_empty());
    }

    #[tokio::test]
    async fn empty_storage_config_degrades_to_text_only() {
        let client = client_with(StorageConfig::default());
        let annotation = client.classify_reference("abc123").await;
        assert!(annotation.safety.all_at_most(Likelihood::VeryUnlikely));
        assert!(annotation.labels.is_empty());
    }
}
