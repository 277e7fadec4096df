//! Folding a fresh STS session into the credentials document.

use crate::{credentials::Session, store::Document};

pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const SESSION_TOKEN: &str = "aws_session_token";
/// Older SDKs and tools only read the token under this name.
pub const SECURITY_TOKEN: &str = "aws_security_token";

pub fn derived_profile_name(base: &str, suffix: &str) -> String {
    format!("{base}{suffix}")
}

/// Returns `existing` with the session credentials upserted into
/// `<base><suffix>`.
///
/// Only the four credential keys of the derived section are written; every
/// other section, and any other key already in the derived section, is
/// carried over unchanged.
pub fn merge(existing: &Document, base: &str, session: &Session, suffix: &str) -> Document {
    let target = derived_profile_name(base, suffix);
    let mut merged = existing.clone();

    merged.ensure_section(&target);
    merged.set(&target, ACCESS_KEY_ID, &session.access_key_id);
    merged.set(&target, SECRET_ACCESS_KEY, &session.secret_access_key);
    merged.set(&target, SESSION_TOKEN, &session.session_token);
    merged.set(&target, SECURITY_TOKEN, &session.session_token);

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREDENTIALS: &str = "\
[default]
aws_access_key_id = AKIADEFAULT
aws_secret_access_key = default-secret

[work]
aws_access_key_id = AKIAWORK
aws_secret_access_key = work-secret
region = eu-west-1

[work-mfa]
aws_access_key_id = ASIAOLD
aws_secret_access_key = old-secret
aws_session_token = old-token
aws_security_token = old-token
note = kept

[personal]
aws_access_key_id = AKIAPERSONAL
aws_secret_access_key = personal-secret
";

    fn session() -> Session {
        Session {
            access_key_id: "ASIANEW".to_string(),
            secret_access_key: "new/secret+key".to_string(),
            session_token: "FwoGZXIvYXdzEBYaDH==".to_string(),
            expiration: "2026-10-17T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_merge_creates_derived_section_with_four_keys() {
        let doc = Document::parse("[work]\naws_access_key_id = AKIAWORK\n").unwrap();
        let merged = merge(&doc, "work", &session(), "-mfa");

        let section = merged.section("work-mfa").unwrap();
        let expected: Vec<(String, Option<String>)> = [
            (ACCESS_KEY_ID, "ASIANEW"),
            (SECRET_ACCESS_KEY, "new/secret+key"),
            (SESSION_TOKEN, "FwoGZXIvYXdzEBYaDH=="),
            (SECURITY_TOKEN, "FwoGZXIvYXdzEBYaDH=="),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect();
        assert_eq!(section, expected);
        assert_eq!(merged.sections(), vec!["work", "work-mfa"]);
    }

    #[test]
    fn test_merge_leaves_other_sections_untouched() {
        let doc = Document::parse(CREDENTIALS).unwrap();
        let merged = merge(&doc, "work", &session(), "-mfa");

        for name in doc.sections().iter().filter(|s| *s != "work-mfa") {
            assert_eq!(merged.section(name), doc.section(name), "section {name} changed");
        }
        assert_eq!(merged.sections(), doc.sections());
    }

    #[test]
    fn test_merge_overwrites_only_credential_keys() {
        let doc = Document::parse(CREDENTIALS).unwrap();
        let merged = merge(&doc, "work", &session(), "-mfa");

        assert_eq!(merged.get("work-mfa", ACCESS_KEY_ID).as_deref(), Some("ASIANEW"));
        assert_eq!(merged.get("work-mfa", SECURITY_TOKEN).as_deref(), Some("FwoGZXIvYXdzEBYaDH=="));
        assert_eq!(merged.get("work-mfa", "note").as_deref(), Some("kept"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let doc = Document::parse(CREDENTIALS).unwrap();
        let once = merge(&doc, "personal", &session(), "-mfa");
        let twice = merge(&once, "personal", &session(), "-mfa");

        assert_eq!(once.to_ini_string(), twice.to_ini_string());
    }

    #[test]
    fn test_merge_uses_custom_suffix() {
        let doc = Document::parse(CREDENTIALS).unwrap();
        let merged = merge(&doc, "work", &session(), "_sts");

        assert!(merged.contains("work_sts"));
        assert_eq!(merged.section("work-mfa"), doc.section("work-mfa"));
    }

    #[test]
    fn test_merge_does_not_mutate_input() {
        let doc = Document::parse(CREDENTIALS).unwrap();
        let before = doc.to_ini_string();
        let _ = merge(&doc, "default", &session(), "-mfa");
        assert_eq!(doc.to_ini_string(), before);
    }
}
