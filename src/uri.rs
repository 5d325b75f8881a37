//! URI parsing and canonical encoding.
//!
//! Parsed parameters are kept as a raw JSON object so they can be handed to
//! foreign handlers and event listeners verbatim.

use indexmap::IndexMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use url::Url;

use crate::error::AppError;
use crate::settings::{UriSettings, VaultParam};

/// Raw parameter object of one dispatch.
pub type RawParams = Map<String, Value>;

/// Keys always emitted before all others.
pub const FIRST_KEYS: [&str; 4] = ["filepath", "filename", "uid", "daily"];
/// Keys always emitted after all others.
pub const LAST_KEYS: [&str; 2] = ["data", "eval"];

/// Characters left unescaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Percent-decode one query component. `+` stays a literal plus.
fn decode_component(raw: &str) -> Result<String, AppError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| AppError::invalid(format!("query is not UTF-8: {e}")))
}

/// Parse `scheme://link-name?k=v&...` into raw parameters. Later duplicates win.
pub fn parse_uri(uri: &str, settings: &UriSettings) -> Result<RawParams, AppError> {
    let url = Url::parse(uri).map_err(|e| AppError::invalid(format!("malformed URI: {e}")))?;
    if url.scheme() != settings.scheme {
        return Err(AppError::invalid(format!(
            "expected scheme \"{}\", got \"{}\"",
            settings.scheme,
            url.scheme()
        )));
    }
    let link = url.host_str().unwrap_or_default();
    if link != settings.link_name {
        return Err(AppError::invalid(format!(
            "expected link \"{}\", got \"{link}\"",
            settings.link_name
        )));
    }
    let mut params = RawParams::new();
    for pair in url.query().unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(key)?, Value::String(decode_component(value)?));
    }
    Ok(params)
}

/// Vault identity used when `include_vault_name` is set.
#[derive(Debug, Clone, Default)]
pub struct VaultInfo {
    pub name: String,
    pub id: Option<String>,
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn rank(key: &str) -> u8 {
    if FIRST_KEYS.contains(&key) {
        0
    } else if LAST_KEYS.contains(&key) {
        2
    } else {
        1
    }
}

/// Serialize parameters into a URI with deterministic key order.
///
/// Falsy values are dropped. Within each of the first/middle/last groups keys
/// keep their insertion order.
pub fn encode_uri(params: &IndexMap<String, Value>, settings: &UriSettings, vault: &VaultInfo) -> String {
    let mut out = format!("{}://{}", settings.scheme, settings.link_name);
    let mut suffix = String::new();

    if settings.include_vault_name {
        let ident = match (settings.vault_param, vault.id.as_deref()) {
            (VaultParam::Id, Some(id)) => id,
            _ => vault.name.as_str(),
        };
        suffix.push_str("?vault=");
        suffix.push_str(&encode_component(ident));
    }

    let mut keys: Vec<(&String, &Value)> = params.iter().filter(|(_, v)| !is_falsy(v)).collect();
    keys.sort_by_key(|(k, _)| rank(k));
    for (key, value) in keys {
        suffix.push(if suffix.is_empty() { '?' } else { '&' });
        suffix.push_str(key);
        suffix.push('=');
        suffix.push_str(&encode_component(&value_text(value)));
    }

    // A trailing encoded space is lost when the host decodes the URI.
    if suffix.ends_with("%20") {
        suffix.push('&');
    }
    out.push_str(&suffix);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn bare_settings() -> UriSettings {
        UriSettings {
            include_vault_name: false,
            ..UriSettings::default()
        }
    }

    fn params(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn empty_params_yield_bare_prefix() {
        let uri = encode_uri(&IndexMap::new(), &bare_settings(), &VaultInfo::default());
        assert_eq!(uri, "obsidian://uri-link");
        let unset = params(&[("mode", Value::Null), ("line", Value::from(0)), ("x", Value::from(""))]);
        assert_eq!(encode_uri(&unset, &bare_settings(), &VaultInfo::default()), "obsidian://uri-link");
    }

    #[test]
    fn first_and_last_groups_bracket_the_rest() {
        let p = params(&[
            ("data", Value::from("body")),
            ("mode", Value::from("append")),
            ("uid", Value::from("u1")),
            ("eval", Value::from("x")),
            ("heading", Value::from("H")),
            ("filepath", Value::from("a.md")),
        ]);
        let uri = encode_uri(&p, &bare_settings(), &VaultInfo::default());
        assert_eq!(
            uri,
            "obsidian://uri-link?uid=u1&filepath=a.md&mode=append&heading=H&data=body&eval=x"
        );
    }

    #[test]
    fn vault_name_or_id_comes_first() {
        let settings = UriSettings::default();
        let vault = VaultInfo {
            name: "My Vault".into(),
            id: Some("abc123".into()),
        };
        let p = params(&[("filepath", Value::from("n.md"))]);
        assert_eq!(
            encode_uri(&p, &settings, &vault),
            "obsidian://uri-link?vault=My%20Vault&filepath=n.md"
        );
        let by_id = UriSettings {
            vault_param: VaultParam::Id,
            ..UriSettings::default()
        };
        assert_eq!(
            encode_uri(&p, &by_id, &vault),
            "obsidian://uri-link?vault=abc123&filepath=n.md"
        );
    }

    #[test]
    fn trailing_encoded_space_gets_ampersand() {
        let p = params(&[("data", Value::from("ends with space "))]);
        let uri = encode_uri(&p, &bare_settings(), &VaultInfo::default());
        assert_eq!(uri, "obsidian://uri-link?data=ends%20with%20space%20&");
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_component("a b/c?d=e&f#"), "a%20b%2Fc%3Fd%3De%26f%23");
        assert_eq!(encode_component("keep-_.!~*'()"), "keep-_.!~*'()");
        assert_eq!(encode_component("ü"), "%C3%BC");
    }

    #[test]
    fn encode_then_parse_recovers_values() {
        let p = params(&[
            ("filepath", Value::from("dir/My Note.md")),
            ("type", Value::from("write")),
            ("data", Value::from("line 1\nline+2 & 100%")),
            ("line", Value::from(4)),
            ("writeUid", Value::from(true)),
        ]);
        let settings = UriSettings::default();
        let vault = VaultInfo {
            name: "V".into(),
            id: None,
        };
        let parsed = parse_uri(&encode_uri(&p, &settings, &vault), &settings).unwrap();
        assert_eq!(parsed["vault"], "V");
        assert_eq!(parsed["filepath"], "dir/My Note.md");
        assert_eq!(parsed["data"], "line 1\nline+2 & 100%");
        assert_eq!(parsed["line"], "4");
        assert_eq!(parsed["writeUid"], "true");
    }

    #[test]
    fn key_order_by_group_then_insertion() {
        let cases: &[(&[&str], &str)] = &[
            (&["mode", "filepath"], "filepath=1&mode=1"),
            (&["data", "mode"], "mode=1&data=1"),
            (&["eval", "data", "daily", "heading"], "daily=1&heading=1&eval=1&data=1"),
            (&["uid", "filename", "filepath"], "uid=1&filename=1&filepath=1"),
            (&["b", "eval", "a", "daily", "c"], "daily=1&b=1&a=1&c=1&eval=1"),
            (&["data", "x", "filepath", "y", "eval", "uid"], "filepath=1&uid=1&x=1&y=1&data=1&eval=1"),
        ];
        for (keys, expected) in cases {
            let p = params(&keys.iter().map(|k| (*k, Value::from(1))).collect::<Vec<_>>());
            let uri = encode_uri(&p, &bare_settings(), &VaultInfo::default());
            assert_eq!(uri, format!("obsidian://uri-link?{expected}"), "{keys:?}");
        }
    }

    #[test]
    fn falsy_values_are_dropped_in_every_group() {
        let falsy = [Value::Null, Value::from(false), Value::from(""), Value::from(0)];
        for value in falsy {
            for key in ["filepath", "mode", "data"] {
                let p = params(&[(key, value.clone()), ("line", Value::from(2))]);
                let uri = encode_uri(&p, &bare_settings(), &VaultInfo::default());
                assert_eq!(uri, "obsidian://uri-link?line=2", "{key}={value}");
            }
        }
        let kept = params(&[("a", Value::from(true)), ("b", Value::from("0")), ("c", Value::from(-1))]);
        assert_eq!(
            encode_uri(&kept, &bare_settings(), &VaultInfo::default()),
            "obsidian://uri-link?a=true&b=0&c=-1"
        );
    }

    #[test]
    fn plus_survives_parsing() {
        let s = UriSettings::default();
        let parsed = parse_uri("obsidian://uri-link?data=a+b%2Bc%20d&flag&k=%3D", &s).unwrap();
        assert_eq!(parsed["data"], "a+b+c d");
        assert_eq!(parsed["flag"], "");
        assert_eq!(parsed["k"], "=");

        let p = params(&[("data", Value::from("a+b"))]);
        let uri = encode_uri(&p, &bare_settings(), &VaultInfo::default());
        assert_eq!(uri, "obsidian://uri-link?data=a%2Bb");
        assert_eq!(parse_uri(&uri, &s).unwrap()["data"], "a+b");
    }

    #[test]
    fn parse_rejects_foreign_scheme_or_link() {
        let s = UriSettings::default();
        assert!(parse_uri("https://uri-link?type=open", &s).is_err());
        assert!(parse_uri("obsidian://open?vault=x", &s).is_err());
        assert!(parse_uri("not a uri", &s).is_err());
        let ok = parse_uri("obsidian://uri-link?type=open&type=write", &s).unwrap();
        assert_eq!(ok["type"], "write");
    }
}
