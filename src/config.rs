use crate::{
    cookie::{CookieRule, TokenRule},
    error::FilterError,
};
use cookie::Cookie;
use serde::Deserialize;
use std::{fs, path::Path};

/// How adder and remover rules are reconciled with the request cookies
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Explicitly set rule attributes override the attributes of the cookie
    /// of the same name. Rewrites `Cookie` and `Set-Cookie`.
    #[default]
    Overlay,
    /// Rule values are tokens appended to, or stripped from, the value of the
    /// cookie of the same name. Rewrites `Cookie` only.
    Token,
}

/// The filter configuration, as deserialized from the hosting environment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: MergeMode,
    #[serde(default)]
    pub adder: Vec<CookieRule>,
    #[serde(default)]
    pub remover: Vec<CookieRule>,
}

impl Config {
    pub fn new(mode: MergeMode) -> Self {
        Config {
            mode,
            adder: Vec::new(),
            remover: Vec::new(),
        }
    }

    pub fn adder(mut self, rule: CookieRule) -> Self {
        self.adder.push(rule);
        self
    }

    pub fn remover(mut self, rule: CookieRule) -> Self {
        self.remover.push(rule);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Build the immutable rules a filter runs with
    pub fn into_rules(self) -> Rules {
        let Config { mode, adder, remover } = self;
        let rule_set = RuleSet { adders: adder, removers: remover };

        match mode {
            MergeMode::Overlay => Rules::Overlay(rule_set.map(CookieRule::to_cookie)),
            MergeMode::Token => Rules::Token(rule_set.map(|rule| {
                if rule.has_attributes() {
                    debug!("Token rule {} only uses name and value, other attributes are ignored", rule);
                }
                rule.to_token_rule()
            })),
        }
    }
}

/// Ordered adder and remover rules. When a name repeats inside one list, the
/// later rule wins.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RuleSet<R> {
    pub adders: Vec<R>,
    pub removers: Vec<R>,
}

impl<R> RuleSet<R> {
    pub fn map<F, U>(&self, mut f: F) -> RuleSet<U>
    where
        F: FnMut(&R) -> U,
    {
        RuleSet {
            adders: self.adders.iter().map(&mut f).collect(),
            removers: self.removers.iter().map(&mut f).collect(),
        }
    }
}

/// Rules ready to be applied, one variant per merge mode
#[derive(Debug, Clone)]
pub enum Rules {
    Overlay(RuleSet<Cookie<'static>>),
    Token(RuleSet<TokenRule>),
}

impl Rules {
    pub fn mode(&self) -> MergeMode {
        match self {
            Rules::Overlay(_) => MergeMode::Overlay,
            Rules::Token(_) => MergeMode::Token,
        }
    }

    pub fn counts(&self) -> (usize, usize) {
        match self {
            Rules::Overlay(set) => (set.adders.len(), set.removers.len()),
            Rules::Token(set) => (set.adders.len(), set.removers.len()),
        }
    }
}
