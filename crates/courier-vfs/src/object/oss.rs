//! HTTP client for Aliyun OSS buckets.
//!
//! Requests use header signature V1: `Authorization: OSS <ak>:<signature>`
//! where the signature is base64(HMAC-SHA1(secret, string-to-sign)).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::header::{CONTENT_TYPE, DATE};
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use sha1::Sha1;
use tracing::debug;

use super::{
    ListRequest, MetadataDirective, ObjectListing, ObjectMeta, ObjectStore, ObjectStoreConnector,
};
use crate::error::{VfsError, VfsResult};
use crate::storage::ObjectStorageConfig;

type HmacSha1 = Hmac<Sha1>;

const KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const HEADER_COPY_SOURCE: &str = "x-oss-copy-source";
const HEADER_METADATA_DIRECTIVE: &str = "x-oss-metadata-directive";
const HEADER_SYMLINK_TARGET: &str = "x-oss-symlink-target";
const HEADER_FORBID_OVERWRITE: &str = "x-oss-forbid-overwrite";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client bound to one bucket and one set of credentials.
#[derive(Debug, Clone)]
pub struct OssClient {
    http: Client,
    scheme: &'static str,
    host: String,
    bucket: String,
    access_key: String,
    access_secret: String,
}

#[derive(Debug, Default)]
struct RequestSpec<'a> {
    key: &'a str,
    subresource: Option<&'static str>,
    query: Vec<(&'static str, String)>,
    oss_headers: BTreeMap<&'static str, String>,
    content_type: Option<&'static str>,
    content_md5: Option<String>,
    body: Option<Bytes>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextMarker", default)]
    next_marker: Option<String>,
    #[serde(rename = "Contents", default)]
    contents: Vec<ListedObject>,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteResult {
    #[serde(rename = "Deleted", default)]
    deleted: Vec<DeletedKey>,
    #[serde(rename = "Error", default)]
    errors: Vec<DeletedKey>,
}

#[derive(Debug, Deserialize)]
struct DeletedKey {
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "LastModified")]
    last_modified: String,
    #[serde(rename = "Size", default)]
    size: u64,
}

impl OssClient {
    /// Client for the bucket named in `config`.
    #[must_use]
    pub fn new(http: Client, config: &ObjectStorageConfig) -> Self {
        let endpoint = config.endpoint.trim_end_matches('/');
        let (scheme, host) = endpoint.strip_prefix("http://").map_or_else(
            || ("https", endpoint.strip_prefix("https://").unwrap_or(endpoint)),
            |host| ("http", host),
        );
        Self {
            http,
            scheme,
            host: host.to_string(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            access_secret: config.access_secret.clone(),
        }
    }

    fn url(&self, spec: &RequestSpec<'_>) -> String {
        let mut url = format!(
            "{}://{}.{}/{}",
            self.scheme,
            self.bucket,
            self.host,
            utf8_percent_encode(spec.key, KEY_ENCODE)
        );
        let mut params: Vec<String> = Vec::new();
        if let Some(subresource) = spec.subresource {
            params.push(subresource.to_string());
        }
        for (name, value) in &spec.query {
            params.push(format!("{name}={}", utf8_percent_encode(value, QUERY_ENCODE)));
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    fn canonical_resource(&self, spec: &RequestSpec<'_>) -> String {
        let mut resource = format!("/{}/{}", self.bucket, spec.key);
        if let Some(subresource) = spec.subresource {
            resource.push('?');
            resource.push_str(subresource);
        }
        resource
    }

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        spec: RequestSpec<'_>,
    ) -> VfsResult<Response> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let to_sign = string_to_sign(
            method.as_str(),
            spec.content_md5.as_deref().unwrap_or(""),
            spec.content_type.unwrap_or(""),
            &date,
            &spec.oss_headers,
            &self.canonical_resource(&spec),
        );
        let signature = sign(&self.access_secret, &to_sign)?;

        let mut request = self
            .http
            .request(method.clone(), self.url(&spec))
            .header(DATE, &date)
            .header(
                "Authorization",
                format!("OSS {}:{signature}", self.access_key),
            );
        for (name, value) in &spec.oss_headers {
            request = request.header(*name, value);
        }
        if let Some(content_type) = spec.content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(content_md5) = &spec.content_md5 {
            request = request.header("Content-MD5", content_md5);
        }
        if let Some(body) = spec.body {
            request = request.body(body);
        }

        debug!(operation, method = %method, key = spec.key, bucket = %self.bucket, "oss request");
        let response = request
            .send()
            .await
            .map_err(|source| VfsError::Transport { operation, source })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = quick_xml::de::from_str::<ErrorBody>(&body).ok();
        let (code, message) = parsed.map_or((None, String::new()), |error| {
            (
                Some(error.code).filter(|code| !code.is_empty()),
                error.message,
            )
        });
        Err(VfsError::backend(
            operation,
            spec.key,
            Some(status.as_u16()),
            code,
            &message,
        ))
    }
}

/// String-to-sign for header signature V1.
pub(crate) fn string_to_sign(
    verb: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    oss_headers: &BTreeMap<&'static str, String>,
    resource: &str,
) -> String {
    let mut canonical = String::new();
    for (name, value) in oss_headers {
        canonical.push_str(&name.to_ascii_lowercase());
        canonical.push(':');
        canonical.push_str(value.trim());
        canonical.push('\n');
    }
    format!("{verb}\n{content_md5}\n{content_type}\n{date}\n{canonical}{resource}")
}

pub(crate) fn sign(secret: &str, to_sign: &str) -> VfsResult<String> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| VfsError::InvalidMetadata {
            operation: "sign",
            field: "access_secret",
            value: String::new(),
        })?;
    mac.update(to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn delete_body(keys: &[String], quiet: bool) -> String {
    let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Delete>");
    body.push_str(if quiet {
        "<Quiet>true</Quiet>"
    } else {
        "<Quiet>false</Quiet>"
    });
    for key in keys {
        body.push_str("<Object><Key>");
        body.push_str(&quick_xml::escape::escape(key.as_str()));
        body.push_str("</Key></Object>");
    }
    body.push_str("</Delete>");
    body
}

fn header_value<'r>(
    response: &'r Response,
    operation: &'static str,
    field: &'static str,
) -> VfsResult<&'r str> {
    response
        .headers()
        .get(field)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| VfsError::InvalidMetadata {
            operation,
            field,
            value: String::new(),
        })
}

fn parse_listing(body: &str) -> VfsResult<ObjectListing> {
    let result: ListBucketResult =
        quick_xml::de::from_str(body).map_err(|source| VfsError::Decode {
            operation: "list_objects",
            source,
        })?;
    let objects = result
        .contents
        .into_iter()
        .map(|object| {
            let last_modified = DateTime::parse_from_rfc3339(&object.last_modified)
                .map(|value| value.with_timezone(&Utc))
                .map_err(|_| VfsError::InvalidMetadata {
                    operation: "list_objects",
                    field: "LastModified",
                    value: object.last_modified.clone(),
                })?;
            Ok(ObjectMeta {
                key: object.key,
                size: object.size,
                last_modified,
            })
        })
        .collect::<VfsResult<Vec<_>>>()?;
    Ok(ObjectListing {
        objects,
        is_truncated: result.is_truncated,
        next_marker: result.next_marker.filter(|marker| !marker.is_empty()),
    })
}

/// Keys a batch delete left behind.
///
/// A quiet response lists only the keys that could not be deleted and is
/// empty on full success. A verbose response lists the deleted keys, so
/// every requested key missing from it failed. `<Error>` entries always fail.
fn parse_delete_result(body: &str, requested: &[String], quiet: bool) -> VfsResult<Vec<String>> {
    let result = if body.trim().is_empty() {
        DeleteResult::default()
    } else {
        quick_xml::de::from_str::<DeleteResult>(body).map_err(|source| VfsError::Decode {
            operation: "delete_objects",
            source,
        })?
    };
    let mut failed: BTreeSet<String> = result.errors.into_iter().map(|entry| entry.key).collect();
    if quiet {
        failed.extend(result.deleted.into_iter().map(|entry| entry.key));
    } else {
        let deleted: BTreeSet<&str> = result
            .deleted
            .iter()
            .map(|entry| entry.key.as_str())
            .collect();
        failed.extend(
            requested
                .iter()
                .filter(|key| !deleted.contains(key.as_str()))
                .cloned(),
        );
    }
    Ok(failed.into_iter().collect())
}

#[async_trait]
impl ObjectStore for OssClient {
    async fn bucket_exists(&self) -> VfsResult<bool> {
        let spec = RequestSpec {
            subresource: Some("bucketInfo"),
            ..RequestSpec::default()
        };
        match self.send("bucket_exists", Method::GET, spec).await {
            Ok(_) => Ok(true),
            Err(VfsError::Backend {
                status: Some(404), ..
            }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn head_object(&self, key: &str) -> VfsResult<ObjectMeta> {
        let spec = RequestSpec {
            key,
            ..RequestSpec::default()
        };
        let response = self.send("head_object", Method::HEAD, spec).await?;
        let length = header_value(&response, "head_object", "content-length")?;
        let size = length
            .parse::<u64>()
            .map_err(|_| VfsError::InvalidMetadata {
                operation: "head_object",
                field: "content-length",
                value: length.to_string(),
            })?;
        let modified = header_value(&response, "head_object", "last-modified")?;
        let last_modified = DateTime::parse_from_rfc2822(modified)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|_| VfsError::InvalidMetadata {
                operation: "head_object",
                field: "last-modified",
                value: modified.to_string(),
            })?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            last_modified,
        })
    }

    async fn list_objects(&self, request: &ListRequest) -> VfsResult<ObjectListing> {
        let mut query = vec![
            ("max-keys", request.max_keys.to_string()),
            ("prefix", request.prefix.clone()),
        ];
        if let Some(marker) = &request.marker {
            query.push(("marker", marker.clone()));
        }
        let spec = RequestSpec {
            query,
            ..RequestSpec::default()
        };
        let response = self.send("list_objects", Method::GET, spec).await?;
        let body = response
            .text()
            .await
            .map_err(|source| VfsError::Transport {
                operation: "list_objects",
                source,
            })?;
        parse_listing(&body)
    }

    async fn put_object(&self, key: &str, body: Bytes) -> VfsResult<()> {
        let spec = RequestSpec {
            key,
            content_type: Some("application/octet-stream"),
            body: Some(body),
            ..RequestSpec::default()
        };
        self.send("put_object", Method::PUT, spec).await.map(|_| ())
    }

    async fn get_object(&self, key: &str) -> VfsResult<Bytes> {
        let spec = RequestSpec {
            key,
            ..RequestSpec::default()
        };
        let response = self.send("get_object", Method::GET, spec).await?;
        response
            .bytes()
            .await
            .map_err(|source| VfsError::Transport {
                operation: "get_object",
                source,
            })
    }

    async fn delete_object(&self, key: &str) -> VfsResult<()> {
        let spec = RequestSpec {
            key,
            ..RequestSpec::default()
        };
        self.send("delete_object", Method::DELETE, spec)
            .await
            .map(|_| ())
    }

    async fn delete_objects(&self, keys: &[String], quiet: bool) -> VfsResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let body = delete_body(keys, quiet);
        let digest = Md5::digest(body.as_bytes());
        let spec = RequestSpec {
            subresource: Some("delete"),
            content_type: Some("application/xml"),
            content_md5: Some(STANDARD.encode(digest)),
            body: Some(Bytes::from(body)),
            ..RequestSpec::default()
        };
        let response = self.send("delete_objects", Method::POST, spec).await?;
        let body = response
            .text()
            .await
            .map_err(|source| VfsError::Transport {
                operation: "delete_objects",
                source,
            })?;
        parse_delete_result(&body, keys, quiet)
    }

    async fn copy_object(
        &self,
        source: &str,
        target: &str,
        directive: MetadataDirective,
    ) -> VfsResult<()> {
        let mut oss_headers = BTreeMap::new();
        oss_headers.insert(
            HEADER_COPY_SOURCE,
            format!(
                "/{}/{}",
                self.bucket,
                utf8_percent_encode(source, KEY_ENCODE)
            ),
        );
        oss_headers.insert(HEADER_METADATA_DIRECTIVE, directive.as_str().to_string());
        let spec = RequestSpec {
            key: target,
            oss_headers,
            ..RequestSpec::default()
        };
        self.send("copy_object", Method::PUT, spec).await.map(|_| ())
    }

    async fn put_symlink(
        &self,
        link: &str,
        target: &str,
        forbid_overwrite: bool,
    ) -> VfsResult<()> {
        let mut oss_headers = BTreeMap::new();
        oss_headers.insert(
            HEADER_SYMLINK_TARGET,
            utf8_percent_encode(target, KEY_ENCODE).to_string(),
        );
        if forbid_overwrite {
            oss_headers.insert(HEADER_FORBID_OVERWRITE, "true".to_string());
        }
        let spec = RequestSpec {
            key: link,
            subresource: Some("symlink"),
            oss_headers,
            ..RequestSpec::default()
        };
        self.send("put_symlink", Method::PUT, spec).await.map(|_| ())
    }

    async fn get_symlink(&self, link: &str) -> VfsResult<String> {
        let spec = RequestSpec {
            key: link,
            subresource: Some("symlink"),
            ..RequestSpec::default()
        };
        let response = self.send("get_symlink", Method::GET, spec).await?;
        let encoded = header_value(&response, "get_symlink", HEADER_SYMLINK_TARGET)?;
        percent_decode_str(encoded)
            .decode_utf8()
            .map(|target| target.into_owned())
            .map_err(|_| VfsError::InvalidMetadata {
                operation: "get_symlink",
                field: HEADER_SYMLINK_TARGET,
                value: encoded.to_string(),
            })
    }
}

/// Builds [`OssClient`]s that share one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct OssConnector {
    http: Client,
}

impl OssConnector {
    /// Connector whose requests time out after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(request_timeout: Option<Duration>) -> VfsResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()
            .map_err(|source| VfsError::Transport {
                operation: "build_client",
                source,
            })?;
        Ok(Self { http })
    }
}

impl ObjectStoreConnector for OssConnector {
    fn connect(&self, config: &ObjectStorageConfig) -> VfsResult<Arc<dyn ObjectStore>> {
        if config.bucket.is_empty() || config.endpoint.is_empty() {
            return Err(VfsError::InvalidPath {
                operation: "connect",
                path: config.endpoint.clone(),
                reason: "bucket and endpoint are required",
            });
        }
        Ok(Arc::new(OssClient::new(self.http.clone(), config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> OssClient {
        OssClient::new(
            Client::new(),
            &ObjectStorageConfig {
                bucket: "media".to_string(),
                endpoint: endpoint.to_string(),
                access_key: "ak".to_string(),
                access_secret: "sk".to_string(),
                ..ObjectStorageConfig::default()
            },
        )
    }

    #[test]
    fn string_to_sign_orders_oss_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("x-oss-symlink-target", "a/b.csv".to_string());
        headers.insert("x-oss-forbid-overwrite", "true".to_string());
        let value = string_to_sign(
            "PUT",
            "",
            "",
            "Thu, 17 Nov 2005 18:49:58 GMT",
            &headers,
            "/media/b/in/report.csv?symlink",
        );
        assert_eq!(
            value,
            "PUT\n\n\nThu, 17 Nov 2005 18:49:58 GMT\nx-oss-forbid-overwrite:true\nx-oss-symlink-target:a/b.csv\n/media/b/in/report.csv?symlink"
        );
    }

    #[test]
    fn signatures_are_deterministic_base64() -> anyhow::Result<()> {
        let first = sign("secret", "GET\n\n\ndate\n/media/key")?;
        let second = sign("secret", "GET\n\n\ndate\n/media/key")?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 28);
        assert_ne!(first, sign("other", "GET\n\n\ndate\n/media/key")?);
        Ok(())
    }

    #[test]
    fn urls_use_virtual_hosted_buckets() {
        let oss = client("oss-cn-hangzhou.aliyuncs.com/");
        let spec = RequestSpec {
            key: "alice/in/q1 report.csv",
            subresource: Some("symlink"),
            ..RequestSpec::default()
        };
        assert_eq!(
            oss.url(&spec),
            "https://media.oss-cn-hangzhou.aliyuncs.com/alice/in/q1%20report.csv?symlink"
        );
        assert_eq!(oss.canonical_resource(&spec), "/media/alice/in/q1 report.csv?symlink");

        let local = client("http://127.0.0.1:9000");
        let listing = RequestSpec {
            query: vec![("prefix", "alice/".to_string())],
            ..RequestSpec::default()
        };
        assert_eq!(local.url(&listing), "http://media.127.0.0.1:9000/?prefix=alice%2F");
    }

    #[test]
    fn listing_xml_decodes() -> anyhow::Result<()> {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>media</Name>
  <Prefix>alice/</Prefix>
  <Marker></Marker>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextMarker>alice/b.csv</NextMarker>
  <Contents>
    <Key>alice/a.csv</Key>
    <LastModified>2024-02-24T08:42:32.000Z</LastModified>
    <ETag>"5B3C1A2E053D763E1B002CC607C5A0FE"</ETag>
    <Size>344606</Size>
  </Contents>
  <Contents>
    <Key>alice/b.csv</Key>
    <LastModified>2024-02-24T08:43:07.000Z</LastModified>
    <Size>12</Size>
  </Contents>
</ListBucketResult>"#;
        let listing = parse_listing(body)?;
        assert!(listing.is_truncated);
        assert_eq!(listing.next_marker.as_deref(), Some("alice/b.csv"));
        assert_eq!(listing.objects.len(), 2);
        assert_eq!(listing.objects[0].size, 344_606);
        Ok(())
    }

    #[test]
    fn delete_body_escapes_keys() {
        let body = delete_body(&["a&b.csv".to_string()], true);
        assert!(body.contains("<Quiet>true</Quiet>"));
        assert!(body.contains("<Key>a&amp;b.csv</Key>"));
    }

    #[test]
    fn quiet_delete_results_list_only_failures() -> anyhow::Result<()> {
        let requested = vec!["alice/a.csv".to_string(), "alice/b.csv".to_string()];
        assert!(parse_delete_result("", &requested, true)?.is_empty());

        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult>
  <Deleted>
    <Key>alice/b.csv</Key>
  </Deleted>
</DeleteResult>"#;
        assert_eq!(
            parse_delete_result(body, &requested, true)?,
            vec!["alice/b.csv".to_string()]
        );
        Ok(())
    }

    #[test]
    fn verbose_delete_results_report_missing_keys() -> anyhow::Result<()> {
        let requested = vec![
            "alice/a.csv".to_string(),
            "alice/b.csv".to_string(),
            "alice/c.csv".to_string(),
        ];
        let body = r#"<DeleteResult>
  <Deleted><Key>alice/a.csv</Key></Deleted>
  <Error><Key>alice/c.csv</Key><Code>AccessDenied</Code></Error>
</DeleteResult>"#;
        assert_eq!(
            parse_delete_result(body, &requested, false)?,
            vec!["alice/b.csv".to_string(), "alice/c.csv".to_string()]
        );
        Ok(())
    }
}
