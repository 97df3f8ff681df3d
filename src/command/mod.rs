// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire command codec for `MegaD` controllers.
//!
//! Controllers speak a URL query dialect in which only `&` and the first `=`
//! of a field are structural. Values routinely carry `;`-delimited status
//! lists and `/`-suffixed counters (`all=on;off/4;on`), so a generic
//! query-string parser must not be used: it would split on `;` or try to
//! percent-decode.
//!
//! # Examples
//!
//! ```
//! use megad_lib::command::{decode, QueryArgs};
//!
//! let params = decode("/?pt=3&all=on;off/4");
//! assert_eq!(params["pt"], "3");
//! assert_eq!(params["all"], "on;off/4");
//!
//! let query = QueryArgs::new().arg("cmd", "7:1").encode();
//! assert_eq!(query, "?cmd=7:1");
//! ```

mod vocabulary;

pub use vocabulary::CommandVocabulary;

use std::collections::HashMap;

/// Decodes the query component of a wire string into key/value pairs.
///
/// The query is the text after the first `?` (up to an optional `#`). A
/// string without `?` is taken as a bare query unless it is a path starting
/// with `/`. Fields are split strictly on `&`; each field is split once on
/// its first `=`. A field without `=` becomes a key with an empty value. A
/// query with neither `&` nor `=` decodes to an empty mapping.
///
/// When a key repeats, the last occurrence wins.
#[must_use]
pub fn decode(wire: &str) -> HashMap<String, String> {
    let query = query_component(wire);
    let mut params = HashMap::new();

    if !query.contains('&') && !query.contains('=') {
        return params;
    }

    for field in query.split('&').filter(|f| !f.is_empty()) {
        let (key, value) = field.split_once('=').unwrap_or((field, ""));
        params.insert(key.to_string(), value.to_string());
    }

    params
}

/// Encodes positional tokens and keyed arguments into a wire query.
///
/// Positional tokens come first, joined with `&`; keyed arguments follow as
/// `key=value` joined with `&`. The result is prefixed with `?`.
#[must_use]
pub fn encode<P, K, V>(positional: &[P], keyed: &[(K, V)]) -> String
where
    P: AsRef<str>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let fields: Vec<String> = positional
        .iter()
        .map(|p| p.as_ref().to_string())
        .chain(
            keyed
                .iter()
                .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref())),
        )
        .collect();

    format!("?{}", fields.join("&"))
}

fn query_component(wire: &str) -> &str {
    let query = match wire.split_once('?') {
        Some((_, query)) => query,
        None if wire.starts_with('/') => "",
        None => wire,
    };
    query.split_once('#').map_or(query, |(query, _)| query)
}

/// A structured outbound command: positional tokens plus keyed arguments.
///
/// Keyed arguments keep their insertion order so that the encoded query is
/// stable.
///
/// # Examples
///
/// ```
/// use megad_lib::command::QueryArgs;
///
/// let args = QueryArgs::new().positional("reboot").arg("pt", 3);
/// assert_eq!(args.encode(), "?reboot&pt=3");
/// assert!(args.mentions("pt"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs {
    positional: Vec<String>,
    keyed: Vec<(String, String)>,
}

impl QueryArgs {
    /// Creates an empty command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional token.
    #[must_use]
    pub fn positional(mut self, token: impl Into<String>) -> Self {
        self.positional.push(token.into());
        self
    }

    /// Appends a keyed argument.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.keyed.push((key.into(), value.to_string()));
        self
    }

    /// Returns the positional tokens.
    #[must_use]
    pub fn positionals(&self) -> &[String] {
        &self.positional
    }

    /// Returns the keyed arguments in insertion order.
    #[must_use]
    pub fn keyed(&self) -> &[(String, String)] {
        &self.keyed
    }

    /// Returns the value of the first keyed argument named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keyed
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if `token` appears as a key or a value of any keyed
    /// argument.
    #[must_use]
    pub fn mentions(&self, token: &str) -> bool {
        self.keyed.iter().any(|(k, v)| k == token || v == token)
    }

    /// Encodes this command into a wire query.
    #[must_use]
    pub fn encode(&self) -> String {
        encode(&self.positional, &self.keyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_POSITIONAL: &[&str] = &[];

    #[test]
    fn decode_splits_on_ampersand_and_first_equals() {
        let params = decode("/?pt=3&cmd=1");
        assert_eq!(params.len(), 2);
        assert_eq!(params["pt"], "3");
        assert_eq!(params["cmd"], "1");
    }

    #[test]
    fn decode_keeps_semicolons_and_slashes_in_values() {
        let params = decode("pt=3;cmd=on/5;x");
        assert_eq!(params.len(), 1);
        assert_eq!(params["pt"], "3;cmd=on/5;x");
    }

    #[test]
    fn decode_only_first_equals_is_structural() {
        let params = decode("?a=b=c&d=e");
        assert_eq!(params["a"], "b=c");
        assert_eq!(params["d"], "e");
    }

    #[test]
    fn decode_token_without_equals_has_empty_value() {
        let params = decode("/?reboot&pt=2");
        assert_eq!(params["reboot"], "");
        assert_eq!(params["pt"], "2");
    }

    #[test]
    fn decode_without_separators_is_empty() {
        assert!(decode("/?garbage").is_empty());
        assert!(decode("garbage").is_empty());
        assert!(decode("").is_empty());
        assert!(decode("/").is_empty());
    }

    #[test]
    fn decode_path_without_query_is_empty() {
        assert!(decode("/sec/index.html").is_empty());
    }

    #[test]
    fn decode_ignores_fragment() {
        let params = decode("/?all=on;off#frag");
        assert_eq!(params["all"], "on;off");
    }

    #[test]
    fn decode_last_duplicate_wins() {
        let params = decode("?pt=1&pt=2");
        assert_eq!(params["pt"], "2");
    }

    #[test]
    fn encode_joins_both_groups_with_single_ampersand() {
        let query = encode(&["a", "b"], &[("pt", "3"), ("cmd", "d")]);
        assert_eq!(query, "?a&b&pt=3&cmd=d");
    }

    #[test]
    fn encode_keyed_only() {
        assert_eq!(encode(NO_POSITIONAL, &[("cmd", "all")]), "?cmd=all");
    }

    #[test]
    fn encode_positional_only() {
        let keyed: &[(&str, &str)] = &[];
        assert_eq!(encode(&["reboot"], keyed), "?reboot");
    }

    #[test]
    fn decode_recovers_encoded_arguments() {
        let keyed = [("pt", "4"), ("cmd", "7:1"), ("all", "on;off/3;on")];
        let decoded = decode(&encode(&["tick"], &keyed));

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded["tick"], "");
        for (k, v) in keyed {
            assert_eq!(decoded[k], v);
        }
    }

    #[test]
    fn query_args_lookup_and_mentions() {
        let args = QueryArgs::new().arg("pt", 3).arg("cmd", "d");
        assert_eq!(args.get("pt"), Some("3"));
        assert_eq!(args.get("missing"), None);
        assert!(args.mentions("d"));
        assert!(args.mentions("cmd"));
        assert!(!args.mentions("all"));
    }
}
