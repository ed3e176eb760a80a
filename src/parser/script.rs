//! Script Parser.
//!
//! Reads a header block of `# KEY: value ...` directive-comment lines out
//! of a shell-style boot script. The header is a three-state machine:
//!
//! - `BeforeParsing` — skip non-directive lines while waiting for the
//!   first directive.
//! - `Parsing` — accumulate directives.
//! - `Done` — entered on the first non-directive line seen after
//!   `Parsing` started; everything after is ignored.
//!
//! Trailing-backslash line continuation joins physical lines into one
//! logical line before directive matching.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{Result, SupervisorError};
use crate::service::{ScriptData, Service, ServiceKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    BeforeParsing,
    Parsing,
    Done,
}

enum Directive {
    Require,
    Provide,
    Before,
    Keyword,
}

fn classify(line: &str) -> Option<(Directive, &str)> {
    let line = line.trim_start();
    if !line.starts_with('#') {
        return None;
    }
    let rest = line[1..].trim_start();

    for (prefix, kind) in [
        ("REQUIRE:", Directive::Require),
        ("PROVIDE:", Directive::Provide),
        ("BEFORE:", Directive::Before),
        ("KEYWORD:", Directive::Keyword),
    ] {
        if let Some(value) = rest.strip_prefix(prefix) {
            return Some((kind, value.trim()));
        }
    }
    None
}

/// Join trailing-backslash continuations into logical lines.
fn logical_lines(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for raw in content.lines() {
        if let Some(stripped) = raw.strip_suffix('\\') {
            current.push_str(stripped);
            current.push(' ');
            continue;
        }
        current.push_str(raw);
        out.push(std::mem::take(&mut current));
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn parse(path: &Path, service: &mut Service) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| SupervisorError::ParseFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    service.kind = ServiceKind::Script;
    let mut data = ScriptData::default();
    let mut state = HeaderState::BeforeParsing;

    for line in logical_lines(&content) {
        match classify(&line) {
            Some((directive, value)) => {
                if state == HeaderState::Done {
                    continue;
                }
                state = HeaderState::Parsing;
                let tokens: Vec<&str> = value.split_whitespace().collect();
                match directive {
                    Directive::Require => {
                        service
                            .dep_names
                            .extend(tokens.iter().map(|t| t.to_string()));
                    }
                    Directive::Provide => {
                        data.provides.extend(tokens.iter().map(|t| t.to_string()));
                    }
                    Directive::Before => {
                        // Recorded for forward compatibility; currently unused.
                    }
                    Directive::Keyword => {
                        for token in tokens {
                            apply_keyword(service, token, path);
                        }
                    }
                }
            }
            None => {
                if state == HeaderState::Parsing {
                    state = HeaderState::Done;
                }
                // In BeforeParsing, non-directive lines are simply skipped.
            }
        }
    }

    service.kind_data = crate::service::KindData::Script(data);
    Ok(())
}

fn apply_keyword(service: &mut Service, keyword: &str, path: &Path) {
    match keyword {
        "nostart" => service.flags.on_start = false,
        "shutdown" => service.flags.on_stop = true,
        "resume" => service.flags.on_resume = true,
        "firstboot" => service.flags.first_boot = true,
        "nojail" => service.flags.disable_in_jail = true,
        "nojailvnet" => service.flags.disable_in_vnet_jail = true,
        other => {
            warn!(path = %path.display(), keyword = other, "unrecognized KEYWORD token ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse_str(content: &str) -> Service {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        let mut svc = Service::new(ServiceKind::Script, "svc".into(), path.clone());
        parse(&path, &mut svc).unwrap();
        svc
    }

    #[test]
    fn basic_header_is_parsed() {
        let svc = parse_str(
            "#!/bin/sh\n# PROVIDE: network\n# REQUIRE: mountcritlocal ldconfig\n# KEYWORD: shutdown\necho hi\n",
        );
        assert_eq!(svc.dep_names, vec!["mountcritlocal", "ldconfig"]);
        assert_eq!(svc.provides(), &["network".to_string()]);
        assert!(svc.flags.on_stop);
        assert!(svc.flags.on_start);
    }

    #[test]
    fn unknown_keyword_keeps_default_flags_and_warns() {
        let svc = parse_str("# KEYWORD: frobnicate\n");
        assert!(svc.flags.on_start);
        assert!(!svc.flags.on_stop);
    }

    #[test]
    fn line_continuation_joins_require_tokens() {
        let svc = parse_str("# REQUIRE: mountcritlocal \\\n    ldconfig netif\n");
        // The continuation joins "# REQUIRE: mountcritlocal " with
        // "    ldconfig netif" into one logical line before directive
        // matching strips the leading "#" and the REQUIRE: prefix.
        assert_eq!(svc.dep_names, vec!["mountcritlocal", "ldconfig", "netif"]);
    }

    #[test]
    fn done_state_ignores_trailing_directives() {
        let svc = parse_str("# REQUIRE: a\necho not-a-directive\n# REQUIRE: b\n");
        assert_eq!(svc.dep_names, vec!["a"]);
    }

    #[test]
    fn round_trip_directives_are_stable() {
        let svc = parse_str("# PROVIDE: x y\n# REQUIRE: z\n# KEYWORD: resume firstboot\n");
        let reserialized = format!(
            "# PROVIDE: {}\n# REQUIRE: {}\n# KEYWORD: resume firstboot\n",
            svc.provides().join(" "),
            svc.dep_names.join(" ")
        );
        let reparsed = parse_str(&reserialized);
        assert_eq!(reparsed.dep_names, svc.dep_names);
        assert_eq!(reparsed.provides(), svc.provides());
        assert_eq!(reparsed.flags.on_resume, svc.flags.on_resume);
        assert_eq!(reparsed.flags.first_boot, svc.flags.first_boot);
    }
}
