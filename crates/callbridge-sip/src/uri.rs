//! SIP URI credential parsing (§4.7 "SIP URI auth").
//!
//! The To URI carries the assistant identity and API key as SIP userinfo:
//! `sip:<assistantID>:<apiKey>@<host>`. This is applied to every SIP
//! method, not just INVITE, so it lives in its own module rather than
//! the streamer.

use derive_more::Display;

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SipAuthError {
    #[display(fmt = "missing sip: scheme")]
    MissingScheme,
    #[display(fmt = "missing userinfo (no '@host')")]
    MissingUserinfo,
    #[display(fmt = "missing ':' separator between assistant id and api key")]
    MissingSeparator,
    #[display(fmt = "empty api key")]
    EmptyApiKey,
}

impl std::error::Error for SipAuthError {}

/// The parsed, authenticated identity of a SIP request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SipCredential {
    pub assistant_id: String,
    pub api_key: String,
    pub host: String,
}

/// Parses and authenticates a `sip:<assistantID>:<apiKey>@<host>` To URI.
///
/// Rejects a missing or empty API key with [`SipAuthError::EmptyApiKey`]
/// (the 400-equivalent SIP rejection is the caller's concern — this
/// function only classifies the URI).
pub fn parse_sip_uri(uri: &str) -> Result<SipCredential, SipAuthError> {
    let rest = uri.strip_prefix("sip:").ok_or(SipAuthError::MissingScheme)?;
    let (userinfo, host) = rest.rsplit_once('@').ok_or(SipAuthError::MissingUserinfo)?;
    let (assistant_id, api_key) = userinfo
        .split_once(':')
        .ok_or(SipAuthError::MissingSeparator)?;
    if api_key.is_empty() {
        return Err(SipAuthError::EmptyApiKey);
    }
    Ok(SipCredential {
        assistant_id: strip_legacy_suffix(assistant_id).to_string(),
        api_key: api_key.to_string(),
        host: host.to_string(),
    })
}

/// Legacy dotted suffixes that earlier SIP trunk configurations appended
/// to the assistant id; stripped so lookups key on the bare id.
const LEGACY_SUFFIXES: [&str; 2] = [".rapid-sip", ".rapida"];

fn strip_legacy_suffix(assistant_id: &str) -> &str {
    for suffix in LEGACY_SUFFIXES {
        if let Some(stripped) = assistant_id.strip_suffix(suffix) {
            return stripped;
        }
    }
    assistant_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_uri() {
        let cred = parse_sip_uri("sip:assistant-1:sk_live_abc@sip.example.com").unwrap();
        assert_eq!(cred.assistant_id, "assistant-1");
        assert_eq!(cred.api_key, "sk_live_abc");
        assert_eq!(cred.host, "sip.example.com");
    }

    #[test]
    fn strips_legacy_rapid_sip_suffix_from_assistant_id() {
        let cred = parse_sip_uri("sip:assistant-1.rapid-sip:sk_live_abc@sip.example.com").unwrap();
        assert_eq!(cred.assistant_id, "assistant-1");
    }

    #[test]
    fn strips_legacy_rapida_suffix_from_assistant_id() {
        let cred = parse_sip_uri("sip:assistant-1.rapida:sk_live_abc@sip.example.com").unwrap();
        assert_eq!(cred.assistant_id, "assistant-1");
    }

    #[test]
    fn leaves_unrelated_dotted_suffix_untouched() {
        let cred = parse_sip_uri("sip:assistant-1.other:sk_live_abc@sip.example.com").unwrap();
        assert_eq!(cred.assistant_id, "assistant-1.other");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert_eq!(
            parse_sip_uri("assistant-1:key@host").unwrap_err(),
            SipAuthError::MissingScheme
        );
    }

    #[test]
    fn rejects_missing_api_key_separator() {
        assert_eq!(
            parse_sip_uri("sip:assistant-1@host").unwrap_err(),
            SipAuthError::MissingSeparator
        );
    }

    #[test]
    fn rejects_empty_api_key() {
        assert_eq!(
            parse_sip_uri("sip:assistant-1:@host").unwrap_err(),
            SipAuthError::EmptyApiKey
        );
    }
}
