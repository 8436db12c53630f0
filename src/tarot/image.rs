//! Image synthesis with a local fallback pool.
//!
//! `ImageSynthesizer::synthesize_image` never fails: any generator or upload
//! problem is logged and replaced by a pick from the fallback pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ImageConfig, StorageConfig};
use crate::error::ImageError;
use crate::tarot::selector::{DrawnCard, RandomSource};

/// Remote image generation backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image and return its raw bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError>;
}

/// Object storage for generated images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist the bytes and return a public URL.
    async fn persist(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, ImageError>;
}

/// Fixed pool of pre-existing images.
#[derive(Debug, Clone)]
pub struct FallbackPool {
    urls: Vec<String>,
}

impl FallbackPool {
    /// `{base}/reading-01` .. `{base}/reading-NN`.
    pub fn from_base(base_url: &str, count: usize) -> Self {
        let base = base_url.trim_end_matches('/');
        let urls = (1..=count.max(1))
            .map(|n| format!("{base}/reading-{n:02}"))
            .collect();
        Self { urls }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Uniform pick using the supplied random source.
    pub fn pick(&self, random: &dyn RandomSource) -> String {
        self.urls[random.next_index(self.urls.len())].clone()
    }
}

/// Generates a reading image, falling back to the pool on any failure.
pub struct ImageSynthesizer {
    generator: Option<Arc<dyn ImageGenerator>>,
    store: Option<Arc<dyn ImageStore>>,
    pool: FallbackPool,
    random: Arc<dyn RandomSource>,
    timeout: Duration,
}

impl ImageSynthesizer {
    pub fn new(
        generator: Option<Arc<dyn ImageGenerator>>,
        store: Option<Arc<dyn ImageStore>>,
        pool: FallbackPool,
        random: Arc<dyn RandomSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            store,
            pool,
            random,
            timeout,
        }
    }

    /// A pool image, used directly for replies that draw no cards.
    pub fn fallback_image(&self) -> String {
        self.pool.pick(self.random.as_ref())
    }

    /// Always returns a usable URL.
    pub async fn synthesize_image(&self, cards: &[DrawnCard]) -> String {
        match self.try_synthesize(cards).await {
            Ok(url) => {
                info!(url = %url, "Generated reading image");
                url
            }
            Err(e) => {
                let url = self.fallback_image();
                warn!(error = %e, fallback = %url, "Image synthesis failed, using fallback image");
                url
            }
        }
    }

    async fn try_synthesize(&self, cards: &[DrawnCard]) -> Result<String, ImageError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ImageError::RequestFailed("no image generator configured".into()))?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ImageError::Upload("no image store configured".into()))?;

        let prompt = build_image_prompt(cards);
        debug!(prompt = %prompt, "Requesting reading image");

        // One deadline covers generation and upload together.
        let attempt = async {
            let bytes = generator.generate(&prompt).await?;
            if bytes.is_empty() {
                return Err(ImageError::Malformed("empty image".into()));
            }

            let file_name = format!("reading-{}.png", uuid::Uuid::new_v4());
            let url = store.persist(bytes, &file_name).await?;
            if url.trim().is_empty() {
                return Err(ImageError::Upload("store returned an empty URL".into()));
            }
            Ok::<_, ImageError>(url)
        };

        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| ImageError::Timeout(self.timeout))?
    }
}

/// Prompt built from the card names and orientations.
pub fn build_image_prompt(cards: &[DrawnCard]) -> String {
    let described = cards
        .iter()
        .map(|c| {
            if c.is_reversed {
                format!("{} (reversed, upside down)", c.card.name)
            } else {
                c.card.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Punk-aesthetic tarot spread featuring {described}. Rider-Waite-Smith symbolism, \
         moody neon palette, grainy zine texture, dramatic lighting, no text"
    )
}

// ── Venice-style image generation ──────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    format: &'a str,
    return_binary: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    images: Vec<String>,
}

/// Decode the first base64 image from a generation response body.
pub fn decode_generated_image(body: &str) -> Result<Vec<u8>, ImageError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ImageError::Malformed(e.to_string()))?;
    let first = parsed
        .images
        .into_iter()
        .next()
        .ok_or_else(|| ImageError::Malformed("no images in response".into()))?;

    // Some providers prefix a data URL header.
    let payload = first.split_once(',').map(|(_, b)| b).unwrap_or(&first);
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageError::Malformed(format!("invalid base64: {e}")))
}

/// HTTP image generator speaking the Venice image API.
pub struct VeniceImageGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    width: u32,
    height: u32,
}

impl VeniceImageGenerator {
    pub fn new(api_key: SecretString, config: &ImageConfig) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ImageError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            width: config.width,
            height: config.height,
        })
    }
}

#[async_trait]
impl ImageGenerator for VeniceImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            width: self.width,
            height: self.height,
            format: "png",
            return_binary: false,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ImageError::RequestFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(ImageError::BadStatus {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        decode_generated_image(&text)
    }
}

// ── IPFS-pinning object store ──────────────────────────────────────────

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(alias = "Hash", alias = "hash")]
    cid: String,
}

/// Uploads images to an IPFS pinning endpoint and returns a gateway URL.
pub struct FilebaseImageStore {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    gateway_url: String,
}

impl FilebaseImageStore {
    pub fn new(api_key: SecretString, config: &StorageConfig) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ImageError::Upload(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for FilebaseImageStore {
    async fn persist(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, ImageError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .map_err(|e| ImageError::Upload(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImageError::Upload(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ImageError::Upload(format!(
                "upload returned status {}",
                resp.status()
            )));
        }

        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| ImageError::Upload(format!("bad upload response: {e}")))?;
        Ok(format!("{}/{}", self.gateway_url, uploaded.cid))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::tarot::selector::{CardSelector, OsRandom, SequenceRandom};
    use crate::tarot::spread::SpreadType;

    enum GenBehavior {
        Ok(Vec<u8>),
        Fail(fn() -> ImageError),
        Hang,
    }

    struct MockGenerator {
        behavior: GenBehavior,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageGenerator for MockGenerator {
        async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.behavior {
                GenBehavior::Ok(bytes) => Ok(bytes.clone()),
                GenBehavior::Fail(make) => Err(make()),
                GenBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(vec![1])
                }
            }
        }
    }

    struct MockStore {
        fail: bool,
        hang: bool,
        uploads: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ImageStore for MockStore {
        async fn persist(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, ImageError> {
            self.uploads.lock().unwrap().push(bytes.len());
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                Err(ImageError::Upload("bucket gone".into()))
            } else {
                Ok(format!("https://ipfs.example/{file_name}"))
            }
        }
    }

    fn pool() -> FallbackPool {
        FallbackPool::from_base("https://cdn.example/tarot/", 3)
    }

    fn synth(behavior: GenBehavior, store_fails: bool) -> (ImageSynthesizer, Arc<MockStore>) {
        synth_with_store(
            behavior,
            MockStore {
                fail: store_fails,
                hang: false,
                uploads: Mutex::new(Vec::new()),
            },
        )
    }

    fn synth_with_store(
        behavior: GenBehavior,
        store: MockStore,
    ) -> (ImageSynthesizer, Arc<MockStore>) {
        let store = Arc::new(store);
        let generator = Arc::new(MockGenerator {
            behavior,
            prompts: Mutex::new(Vec::new()),
        });
        let synth = ImageSynthesizer::new(
            Some(generator),
            Some(store.clone()),
            pool(),
            Arc::new(OsRandom),
            Duration::from_millis(50),
        );
        (synth, store)
    }

    fn cards() -> Vec<DrawnCard> {
        CardSelector::new(Arc::new(OsRandom))
            .select_cards(SpreadType::PastPresentFuture)
            .unwrap()
    }

    #[test]
    fn pool_urls_are_numbered() {
        assert_eq!(
            pool().urls(),
            &[
                "https://cdn.example/tarot/reading-01".to_string(),
                "https://cdn.example/tarot/reading-02".to_string(),
                "https://cdn.example/tarot/reading-03".to_string(),
            ]
        );
    }

    #[test]
    fn pool_pick_is_driven_by_random_source() {
        let random = SequenceRandom::new([0.5, 0.0, 0.99]);
        let pool = pool();
        assert!(pool.pick(&random).ends_with("reading-02"));
        assert!(pool.pick(&random).ends_with("reading-01"));
        assert!(pool.pick(&random).ends_with("reading-03"));
    }

    #[tokio::test]
    async fn success_returns_stored_url() {
        let (synth, store) = synth(GenBehavior::Ok(vec![1, 2, 3]), false);
        let url = synth.synthesize_image(&cards()).await;
        assert!(url.starts_with("https://ipfs.example/reading-"));
        assert_eq!(*store.uploads.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn non_2xx_falls_back() {
        let (synth, _) = synth(
            GenBehavior::Fail(|| ImageError::BadStatus {
                status: 503,
                body: "overloaded".into(),
            }),
            false,
        );
        let url = synth.synthesize_image(&cards()).await;
        assert!(pool().urls().contains(&url));
    }

    #[tokio::test]
    async fn malformed_body_falls_back() {
        let (synth, store) = synth(
            GenBehavior::Fail(|| ImageError::Malformed("not json".into())),
            false,
        );
        let url = synth.synthesize_image(&cards()).await;
        assert!(pool().urls().contains(&url));
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_falls_back() {
        let (synth, _) = synth(GenBehavior::Hang, false);
        let url = tokio::time::timeout(Duration::from_secs(2), synth.synthesize_image(&cards()))
            .await
            .expect("synthesizer must respect its own timeout");
        assert!(pool().urls().contains(&url));
    }

    #[tokio::test]
    async fn stalled_upload_falls_back() {
        let (synth, store) = synth_with_store(
            GenBehavior::Ok(vec![1, 2, 3]),
            MockStore {
                fail: false,
                hang: true,
                uploads: Mutex::new(Vec::new()),
            },
        );
        let url = tokio::time::timeout(Duration::from_secs(2), synth.synthesize_image(&cards()))
            .await
            .expect("upload must be bounded by the synthesis timeout");
        assert!(pool().urls().contains(&url));
        assert_eq!(*store.uploads.lock().unwrap(), vec![3]);
    }

    #[test]
    fn filebase_store_builds_with_timeout() {
        let config = StorageConfig {
            gateway_url: "https://gw.example/ipfs/".to_string(),
            timeout: Duration::from_secs(3),
            ..StorageConfig::default()
        };
        let store = FilebaseImageStore::new(SecretString::from("k"), &config).unwrap();
        assert_eq!(store.gateway_url, "https://gw.example/ipfs");
    }

    #[tokio::test]
    async fn empty_image_falls_back() {
        let (synth, store) = synth(GenBehavior::Ok(Vec::new()), false);
        let url = synth.synthesize_image(&cards()).await;
        assert!(pool().urls().contains(&url));
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_falls_back() {
        let (synth, store) = synth(GenBehavior::Ok(vec![9; 16]), true);
        let url = synth.synthesize_image(&cards()).await;
        assert!(pool().urls().contains(&url));
        assert_eq!(store.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_generator_uses_pool() {
        let synth = ImageSynthesizer::new(
            None,
            None,
            pool(),
            Arc::new(OsRandom),
            Duration::from_secs(1),
        );
        let url = synth.synthesize_image(&cards()).await;
        assert!(!url.is_empty());
        assert!(pool().urls().contains(&url));
    }

    #[test]
    fn prompt_mentions_cards_and_orientation() {
        let mut drawn = cards();
        drawn[1].is_reversed = true;
        drawn[0].is_reversed = false;
        let prompt = build_image_prompt(&drawn);
        assert!(prompt.contains(&drawn[0].card.name));
        assert!(prompt.contains(&format!("{} (reversed", drawn[1].card.name)));
    }

    #[test]
    fn decode_handles_plain_and_data_url() {
        let b64 = STANDARD.encode([7u8, 8, 9]);
        let body = format!(r#"{{"images":["{b64}"]}}"#);
        assert_eq!(decode_generated_image(&body).unwrap(), vec![7, 8, 9]);

        let body = format!(r#"{{"images":["data:image/png;base64,{b64}"]}}"#);
        assert_eq!(decode_generated_image(&body).unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn decode_rejects_malformed_bodies() {
        assert!(matches!(
            decode_generated_image("<html>"),
            Err(ImageError::Malformed(_))
        ));
        assert!(matches!(
            decode_generated_image(r#"{"images":[]}"#),
            Err(ImageError::Malformed(_))
        ));
        assert!(matches!(
            decode_generated_image(r#"{"images":["***"]}"#),
            Err(ImageError::Malformed(_))
        ));
    }

    #[test]
    fn upload_response_accepts_ipfs_hash_key() {
        let parsed: UploadResponse = serde_json::from_str(r#"{"Hash":"bafy123"}"#).unwrap();
        assert_eq!(parsed.cid, "bafy123");
        let parsed: UploadResponse = serde_json::from_str(r#"{"cid":"bafy456"}"#).unwrap();
        assert_eq!(parsed.cid, "bafy456");
    }
}
