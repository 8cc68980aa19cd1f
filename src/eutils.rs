use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::Uid;
use crate::error::ReadsError;

pub const DEFAULT_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Read-only GET transport for E-utilities queries.
pub trait EutilsClient: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ReadsError>;
}

#[derive(Clone)]
pub struct EutilsHttpClient {
    client: Client,
}

impl EutilsHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ReadsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sra-reads/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReadsError::UpstreamQuery(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| ReadsError::UpstreamQuery(err.to_string()))?;
        Ok(Self { client })
    }
}

impl EutilsClient for EutilsHttpClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ReadsError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ReadsError::UpstreamQuery(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "E-utilities request failed".to_string());
            return Err(ReadsError::UpstreamStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| ReadsError::UpstreamQuery(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// URL templates for the three E-utilities endpoints the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EutilsUrls {
    base: String,
}

impl EutilsUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// One page of a search: at most `retmax` ids starting at `retstart`.
    pub fn esearch(
        &self,
        database: &str,
        terms: &[String],
        retstart: usize,
        retmax: usize,
    ) -> Result<String, ReadsError> {
        let term = terms.join(",");
        self.endpoint(
            "esearch.fcgi",
            &[
                ("db", database),
                ("term", &term),
                ("retstart", &retstart.to_string()),
                ("retmax", &retmax.to_string()),
            ],
        )
    }

    pub fn elink(&self, db_from: &str, db: &str, ids: &[Uid]) -> Result<String, ReadsError> {
        let id_list = join_uids(ids);
        self.endpoint(
            "elink.fcgi",
            &[("dbfrom", db_from), ("db", db), ("id", &id_list)],
        )
    }

    pub fn efetch(&self, db: &str, ids: &[Uid]) -> Result<String, ReadsError> {
        let id_list = join_uids(ids);
        self.endpoint("efetch.fcgi", &[("db", db), ("id", &id_list)])
    }

    fn endpoint(&self, name: &str, params: &[(&str, &str)]) -> Result<String, ReadsError> {
        let url = Url::parse_with_params(&format!("{}/{name}", self.base), params)
            .map_err(|err| ReadsError::UpstreamQuery(format!("invalid URL for {name}: {err}")))?;
        Ok(url.into())
    }
}

impl Default for EutilsUrls {
    fn default() -> Self {
        Self::new(DEFAULT_EUTILS_BASE)
    }
}

fn join_uids(ids: &[Uid]) -> String {
    ids.iter()
        .map(Uid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esearch_url_joins_terms() {
        let urls = EutilsUrls::new("https://example.org/eutils/");
        let url = urls
            .esearch(
                "bioproject",
                &["PRJNA1".to_string(), "PRJNA2".to_string()],
                20,
                10,
            )
            .unwrap();
        assert_eq!(
            url,
            "https://example.org/eutils/esearch.fcgi?db=bioproject&term=PRJNA1%2CPRJNA2&retstart=20&retmax=10"
        );
    }

    #[test]
    fn elink_and_efetch_urls() {
        let urls = EutilsUrls::default();
        let ids = [Uid::new(10), Uid::new(20)];
        assert_eq!(
            urls.elink("bioproject", "biosample", &ids).unwrap(),
            format!("{DEFAULT_EUTILS_BASE}/elink.fcgi?dbfrom=bioproject&db=biosample&id=10%2C20")
        );
        assert_eq!(
            urls.efetch("sra", &ids).unwrap(),
            format!("{DEFAULT_EUTILS_BASE}/efetch.fcgi?db=sra&id=10%2C20")
        );
    }

    #[test]
    fn query_values_are_form_encoded() {
        let urls = EutilsUrls::new("https://example.org/eutils");
        let url = urls
            .esearch("sra", &["SRP1 AND ERP2&x".to_string()], 0, 5)
            .unwrap();
        assert_eq!(
            url,
            "https://example.org/eutils/esearch.fcgi?db=sra&term=SRP1+AND+ERP2%26x&retstart=0&retmax=5"
        );
    }

    #[test]
    fn unparseable_base_is_upstream_error() {
        let urls = EutilsUrls::new("not a url");
        assert!(matches!(
            urls.efetch("sra", &[Uid::new(1)]),
            Err(ReadsError::UpstreamQuery(_))
        ));
    }
}
