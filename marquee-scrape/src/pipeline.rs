//! The resolution pipeline: title in, image file on disk out.
//!
//! Stages run strictly in order and never retry. The first stage that cannot
//! produce its output ends the request with a [`PipelineError`] naming it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use marquee_config::{ConfigError, ExtractionRules, MarqueeConfig, RelevanceBias};
use marquee_http::{Fetcher, HttpError};

use crate::extract;
use crate::query::{Query, search_url};
use crate::store;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SearchPage,
    CandidateLinks,
    CandidatePage,
    ImageSource,
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SearchPage => "search page",
            Stage::CandidateLinks => "candidate links",
            Stage::CandidatePage => "candidate page",
            Stage::ImageSource => "image source",
            Stage::Download => "image download",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("query title is empty")]
    EmptyTitle,
    #[error("{stage} fetch failed: {source}")]
    Fetch {
        stage: Stage,
        #[source]
        source: HttpError,
    },
    #[error("{stage} extraction found nothing")]
    Extraction { stage: Stage },
    #[error("could not save image to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Fetch { stage, .. } | PipelineError::Extraction { stage } => {
                Some(*stage)
            }
            PipelineError::Persist { .. } => Some(Stage::Download),
            PipelineError::EmptyTitle => None,
        }
    }
}

/// Outcome of a fully served request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// URL the bytes were downloaded from.
    pub source_url: String,
    /// File the bytes were written to.
    pub path: PathBuf,
}

/// Runs the five resolution stages plus the download against a [`Fetcher`].
pub struct Resolver {
    fetcher: Arc<dyn Fetcher>,
    bias: RelevanceBias,
    search_base: String,
    rules: ExtractionRules,
    dest_dir: PathBuf,
    image_extension: String,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, cfg: &MarqueeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            fetcher,
            bias: cfg.bias()?,
            search_base: cfg.search_base.clone(),
            rules: cfg.extraction.clone(),
            dest_dir: cfg.dest_dir.clone(),
            image_extension: cfg.image_extension.clone(),
        })
    }

    pub fn search_url(&self, query: &Query) -> String {
        search_url(&self.search_base, &self.bias, query)
    }

    /// Where an image for `query` is (or would be) stored.
    pub fn image_path(&self, query: &Query) -> PathBuf {
        store::image_path(&self.dest_dir, query.encoded_title(), &self.image_extension)
    }

    /// Stages 1-5: turn a title into the URL of its representative image.
    pub async fn resolve(&self, query: &Query) -> Result<String, PipelineError> {
        if query.is_blank() {
            return Err(PipelineError::EmptyTitle);
        }
        let started = Instant::now();

        let url = self.search_url(query);
        tracing::info!(
            target: "pipeline",
            title = query.raw_title(),
            %url,
            "pipeline.stage.search_page"
        );
        let search_page = self
            .fetcher
            .fetch_text(&url)
            .await
            .map_err(|source| PipelineError::Fetch {
                stage: Stage::SearchPage,
                source,
            })?;

        let candidate = {
            let doc = extract::parse_page(&search_page);
            let links = extract::candidate_links(&doc, self.bias.match_form(), &self.rules);
            tracing::debug!(
                target: "pipeline",
                candidate_count = links.len(),
                candidates = ?links,
                "pipeline.stage.candidate_links"
            );
            links.into_iter().next()
        }
        .ok_or(PipelineError::Extraction {
            stage: Stage::CandidateLinks,
        })?;

        tracing::info!(target: "pipeline", %candidate, "pipeline.stage.candidate_page");
        let candidate_page = self
            .fetcher
            .fetch_text(&candidate)
            .await
            .map_err(|source| PipelineError::Fetch {
                stage: Stage::CandidatePage,
                source,
            })?;

        let raw_src = {
            let doc = extract::parse_page(&candidate_page);
            extract::image_sources(&doc, &self.rules).into_iter().next()
        }
        .ok_or(PipelineError::Extraction {
            stage: Stage::ImageSource,
        })?;
        let normalized = extract::normalize_image_source(&raw_src, &self.rules);
        let image_url = extract::absolutize(&candidate, &normalized);

        tracing::info!(
            target: "pipeline",
            raw_src = %raw_src,
            %image_url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline.stage.image_source"
        );
        Ok(image_url)
    }

    /// Download `image_url` and store it under the query's file name,
    /// replacing any earlier download for the same title.
    pub async fn download(&self, query: &Query, image_url: &str) -> Result<PathBuf, PipelineError> {
        let bytes = self
            .fetcher
            .fetch_bytes(image_url)
            .await
            .map_err(|source| PipelineError::Fetch {
                stage: Stage::Download,
                source,
            })?;
        let path = self.image_path(query);
        marquee_common::fs::write_atomic(&path, &bytes).map_err(|source| {
            PipelineError::Persist {
                path: path.clone(),
                source,
            }
        })?;
        tracing::info!(
            target: "pipeline",
            path = %path.display(),
            bytes = bytes.len(),
            "pipeline.download.saved"
        );
        Ok(path)
    }

    /// Resolve and download in one go.
    pub async fn fetch_image(&self, query: &Query) -> Result<ResolvedImage, PipelineError> {
        let source_url = self.resolve(query).await?;
        let path = self.download(query, &source_url).await?;
        Ok(ResolvedImage { source_url, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies by URL and records every request.
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, String>,
        blobs: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, HttpError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| HttpError::Network(format!("no stub for {url}")))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.blobs
                .get(url)
                .cloned()
                .ok_or_else(|| HttpError::Network(format!("no stub for {url}")))
        }
    }

    const SEARCH_URL: &str = "https://www.google.com/search?q=rotten+tomatoes+The+Wire";
    const CANDIDATE: &str = "https://www.rottentomatoes.com/tv/the_wire";

    fn search_page() -> String {
        format!(r#"<a href="/url?q={CANDIDATE}&sa=U&ved=2">The Wire</a>"#)
    }

    fn candidate_page(src: &str) -> String {
        format!(r#"<img class="PhotosCarousel__image" src="{src}">"#)
    }

    fn resolver(stub: Arc<StubFetcher>, dest: &std::path::Path) -> Resolver {
        let cfg = MarqueeConfig {
            dest_dir: dest.to_path_buf(),
            ..MarqueeConfig::default()
        };
        Resolver::new(stub, &cfg).unwrap()
    }

    #[tokio::test]
    async fn resolves_through_all_stages() {
        let mut stub = StubFetcher::default();
        stub.pages.insert(SEARCH_URL.into(), search_page());
        stub.pages.insert(
            CANDIDATE.into(),
            candidate_page("https://resizing.flixster.com/x=/v2/https://img.example/wire.jpg"),
        );
        let stub = Arc::new(stub);
        let dir = tempfile::tempdir().unwrap();

        let url = resolver(stub.clone(), dir.path())
            .resolve(&Query::new("The Wire"))
            .await
            .unwrap();

        assert_eq!(url, "https://img.example/wire.jpg");
        assert_eq!(stub.calls(), vec![SEARCH_URL, CANDIDATE]);
    }

    #[tokio::test]
    async fn no_candidate_is_an_extraction_error() {
        let mut stub = StubFetcher::default();
        stub.pages
            .insert(SEARCH_URL.into(), r#"<a href="/url?q=https://imdb.com/x">x</a>"#.into());
        let stub = Arc::new(stub);
        let dir = tempfile::tempdir().unwrap();

        let err = resolver(stub.clone(), dir.path())
            .resolve(&Query::new("The Wire"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Extraction {
                stage: Stage::CandidateLinks
            }
        ));
        assert_eq!(stub.calls().len(), 1, "candidate page must not be fetched");
    }

    #[tokio::test]
    async fn first_image_without_src_is_an_extraction_error() {
        let mut stub = StubFetcher::default();
        stub.pages.insert(SEARCH_URL.into(), search_page());
        stub.pages.insert(
            CANDIDATE.into(),
            r#"<img class="PhotosCarousel__image"><img class="PhotosCarousel__image" src="b.jpg">"#
                .into(),
        );
        let dir = tempfile::tempdir().unwrap();

        let err = resolver(Arc::new(stub), dir.path())
            .resolve(&Query::new("The Wire"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Extraction {
                stage: Stage::ImageSource
            }
        ));
    }

    #[tokio::test]
    async fn no_image_is_an_extraction_error() {
        let mut stub = StubFetcher::default();
        stub.pages.insert(SEARCH_URL.into(), search_page());
        stub.pages
            .insert(CANDIDATE.into(), r#"<img class="Poster" src="a.jpg">"#.into());
        let dir = tempfile::tempdir().unwrap();

        let err = resolver(Arc::new(stub), dir.path())
            .resolve(&Query::new("The Wire"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::ImageSource));
        assert_eq!(err.to_string(), "image source extraction found nothing");
    }

    #[tokio::test]
    async fn search_fetch_failure_names_the_stage() {
        let stub = Arc::new(StubFetcher::default());
        let dir = tempfile::tempdir().unwrap();

        let err = resolver(stub, dir.path())
            .resolve(&Query::new("The Wire"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::SearchPage));
        assert!(err.to_string().starts_with("search page fetch failed"));
    }

    #[tokio::test]
    async fn blank_title_makes_no_requests() {
        let stub = Arc::new(StubFetcher::default());
        let dir = tempfile::tempdir().unwrap();

        let err = resolver(stub.clone(), dir.path())
            .resolve(&Query::new("  "))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyTitle));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn downloading_twice_overwrites_one_file() {
        let mut stub = StubFetcher::default();
        stub.pages.insert(SEARCH_URL.into(), search_page());
        stub.pages.insert(
            CANDIDATE.into(),
            candidate_page("https://img.example/wire.jpg"),
        );
        stub.blobs
            .insert("https://img.example/wire.jpg".into(), b"JPEGDATA".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(Arc::new(stub), dir.path());
        let query = Query::new("The Wire");

        let first = resolver.fetch_image(&query).await.unwrap();
        let second = resolver.fetch_image(&query).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.path, dir.path().join("The+Wire.jpg"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"JPEGDATA");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
