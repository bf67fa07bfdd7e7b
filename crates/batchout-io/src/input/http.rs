use super::Input;
use crate::error::InputError;
use crate::params::{FetchParams, ParamValue};
use batchout_config::{ConfigError, Fragment};
use exponential_backoff::Backoff;
use reqwest::blocking::Client;
use reqwest::Method;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

/// Fetches one payload per `fetch` call by formatting `url` with the given
/// params and issuing a blocking HTTP request. A response is fetched once
/// and memoized until `reset()`, matching the original's "one response per
/// round" semantics (repeated `fetch` calls within the same round return
/// nothing once a response has already been produced).
pub struct HttpInput {
    url_template: String,
    method: Method,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    required_params: Vec<String>,
    ignore_status_codes: Vec<u16>,
    retries: u32,
    max_backoff_sec: u64,
    client: Client,
    fetched: bool,
}

impl HttpInput {
    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Input>, ConfigError> {
        let url_template: String = fragment.required("url")?;
        let method_name = fragment.choice("method", &["get", "post", "put", "delete", "head"], Some("get"))?;
        let method = Method::from_str(&method_name.to_uppercase()).expect("choice() validated membership");
        let timeout_sec: u64 = fragment.with_default("timeout_sec", 60)?;
        let headers: BTreeMap<String, String> = fragment.with_default("headers", BTreeMap::new())?;
        let required_params: Vec<String> = fragment.with_default("params", Vec::new())?;
        let ignore_status_codes: Vec<u16> = fragment.with_default("ignore_status_codes", Vec::new())?;
        let retries: u32 = fragment.with_default("retries", 3)?;
        let max_backoff_sec: u64 = fragment.with_default("max_backoff_sec", 60)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| ConfigError::invalid("url", e.to_string()))?;

        Ok(Box::new(HttpInput {
            url_template,
            method,
            headers,
            timeout: Duration::from_secs(timeout_sec),
            required_params,
            ignore_status_codes,
            retries,
            max_backoff_sec,
            client,
            fetched: false,
        }))
    }
}

impl Input for HttpInput {
    fn fetch(&mut self, params: &FetchParams) -> Result<Option<Vec<u8>>, InputError> {
        if self.fetched {
            return Ok(None);
        }
        for name in &self.required_params {
            if !matches!(params.get(name), Some(ParamValue::Present(_))) {
                return Ok(None);
            }
        }

        let url = params.format(&self.url_template);
        let backoff = Backoff::new(self.retries, Duration::from_millis(0), Some(Duration::from_secs(self.max_backoff_sec)));
        let mut attempt: u32 = 0;

        loop {
            let mut request = self.client.request(self.method.clone(), &url).timeout(self.timeout);
            for (k, v) in &self.headers {
                request = request.header(k.as_str(), v.as_str());
            }
            let response = request.send().map_err(|e| InputError::Request(e.to_string()))?;
            let status = response.status();
            if self.ignore_status_codes.contains(&status.as_u16()) {
                return Ok(None);
            }
            if status.is_server_error() || status.is_client_error() {
                if let Some(wait) = backoff.next(attempt) {
                    if attempt < self.retries {
                        attempt += 1;
                        std::thread::sleep(wait);
                        continue;
                    }
                }
                let body = response.text().unwrap_or_default();
                return Err(InputError::BadResponse { status: status.as_u16(), body });
            }
            self.fetched = true;
            let bytes = response.bytes().map_err(|e| InputError::Request(e.to_string()))?;
            return Ok(Some(bytes.to_vec()));
        }
    }

    fn commit(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn reset(&mut self) -> Result<(), InputError> {
        self.fetched = false;
        Ok(())
    }

    fn clone_fresh(&self) -> Box<dyn Input> {
        Box::new(HttpInput {
            url_template: self.url_template.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            required_params: self.required_params.clone(),
            ignore_status_codes: self.ignore_status_codes.clone(),
            retries: self.retries,
            max_backoff_sec: self.max_backoff_sec,
            client: self.client.clone(),
            fetched: false,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_required_param_yields_none_without_a_request() {
        let f = Fragment::from_value(serde_json::json!({
            "type": "http", "url": "https://example.invalid/{id}", "params": ["id"],
        }))
        .unwrap();
        let mut input = HttpInput::construct(&f).unwrap();
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), None);
    }
}
