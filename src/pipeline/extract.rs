//! Flat argument map assembly.

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::header;

use crate::codec::{essence, FORM_URLENCODED, MULTIPART_FORM_DATA};
use crate::http::request::RawRequest;
use crate::resource::Verb;

/// Flattened request arguments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractedArgs {
    /// Form body fields, then query fields, then path variables (path wins).
    pub args: HashMap<String, String>,
    /// Form body fields alone (urlencoded or multipart text), for form body binding.
    pub form: HashMap<String, String>,
}

/// Collect arguments for one request. Repeated keys are joined with `,`.
///
/// The body is only read for body verbs sent as urlencoded or multipart
/// forms; it stays cached on `raw` for the body decode stage.
pub async fn extract_args(raw: &mut RawRequest, verb: Verb) -> ExtractedArgs {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut form_pairs: Vec<(String, String)> = Vec::new();

    let form_type = raw.content_types().into_iter().find(|ct| {
        let kind = essence(ct);
        kind == FORM_URLENCODED || kind == MULTIPART_FORM_DATA
    });
    if let Some(content_type) = form_type.filter(|_| verb.has_body()) {
        match raw.bytes().await {
            Ok(bytes) if essence(&content_type) == MULTIPART_FORM_DATA => {
                form_pairs = multipart_pairs(&content_type, bytes).await;
            }
            Ok(bytes) => form_pairs = parse_pairs(&bytes),
            Err(e) => tracing::debug!(error = %e, "Could not read form body"),
        }
    }
    pairs.extend(form_pairs.iter().cloned());
    if let Some(query) = raw.query() {
        pairs.extend(parse_pairs(query.as_bytes()));
    }

    let mut args = join_values(pairs);
    for (key, value) in raw.path_vars() {
        args.insert(key.clone(), value.clone());
    }

    ExtractedArgs {
        args,
        form: join_values(form_pairs),
    }
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Text fields of a multipart body, in order. File parts are skipped.
async fn multipart_pairs(content_type: &str, bytes: Bytes) -> Vec<(String, String)> {
    let request = match axum::http::Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
    {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Could not rebuild multipart request");
            return Vec::new();
        }
    };
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected multipart body");
            return Vec::new();
        }
    };

    let mut pairs = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed multipart body");
                break;
            }
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        match field.text().await {
            Ok(value) => pairs.push((name, value)),
            Err(e) => {
                tracing::debug!(error = %e, field = %name, "Unreadable multipart field");
                break;
            }
        }
    }
    pairs
}

fn join_values(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut joined: HashMap<String, String> = HashMap::new();
    for (key, value) in pairs {
        joined
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn raw(method: &str, uri: &str, content_type: Option<&str>, body: &'static str) -> RawRequest {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        RawRequest::new(builder.body(Body::from(body)).unwrap())
    }

    #[tokio::test]
    async fn test_query_values_joined() {
        let mut raw = raw("GET", "/widgets?tag=a&tag=b&name=x%20y", None, "");
        let extracted = extract_args(&mut raw, Verb::Get).await;
        assert_eq!(extracted.args["tag"], "a,b");
        assert_eq!(extracted.args["name"], "x y");
        assert!(extracted.form.is_empty());
    }

    #[tokio::test]
    async fn test_path_vars_override() {
        let vars = HashMap::from([("id".to_string(), "7".to_string())]);
        let mut raw = raw("GET", "/widgets/7?id=9&limit=3", None, "").with_path_vars(vars);
        let extracted = extract_args(&mut raw, Verb::Get).await;
        assert_eq!(extracted.args["id"], "7");
        assert_eq!(extracted.args["limit"], "3");
    }

    #[tokio::test]
    async fn test_form_body_before_query() {
        let mut raw = raw(
            "POST",
            "/signup?tag=q",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "name=ada&tag=f",
        );
        let extracted = extract_args(&mut raw, Verb::Post).await;
        assert_eq!(extracted.args["tag"], "f,q");
        assert_eq!(extracted.args["name"], "ada");
        assert_eq!(extracted.form.len(), 2);
        assert_eq!(extracted.form["tag"], "f");

        // Body stays readable for the decode stage.
        assert_eq!(raw.bytes().await.unwrap(), "name=ada&tag=f");
    }

    #[tokio::test]
    async fn test_form_body_ignored_for_bodiless_verbs() {
        let mut raw = raw(
            "DELETE",
            "/widgets",
            Some("application/x-www-form-urlencoded"),
            "name=ada",
        );
        let extracted = extract_args(&mut raw, Verb::Delete).await;
        assert!(extracted.args.is_empty());
    }

    #[tokio::test]
    async fn test_multipart_text_fields() {
        let body = concat!(
            "--widgetpart\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
            "sprocket\r\n",
            "--widgetpart\r\n",
            "Content-Disposition: form-data; name=\"tag\"\r\n\r\n",
            "blue\r\n",
            "--widgetpart\r\n",
            "Content-Disposition: form-data; name=\"photo\"; filename=\"w.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "PNGDATA\r\n",
            "--widgetpart--\r\n",
        );
        let mut raw = raw(
            "POST",
            "/widgets?tag=red",
            Some("multipart/form-data; boundary=widgetpart"),
            body,
        );
        let extracted = extract_args(&mut raw, Verb::Post).await;
        assert_eq!(extracted.args["name"], "sprocket");
        assert_eq!(extracted.args["tag"], "blue,red");
        assert!(!extracted.args.contains_key("photo"));
        assert_eq!(extracted.form.len(), 2);

        // Body stays readable for the decode stage.
        assert_eq!(raw.bytes().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_malformed_multipart_contributes_nothing() {
        let mut raw = raw(
            "POST",
            "/widgets?limit=2",
            Some("multipart/form-data; boundary=widgetpart"),
            "not a multipart body",
        );
        let extracted = extract_args(&mut raw, Verb::Post).await;
        assert_eq!(extracted.args.len(), 1);
        assert_eq!(extracted.args["limit"], "2");
        assert!(extracted.form.is_empty());
    }
}
