//! Translation of Lisp identifiers into host identifiers.
//!
//! Every special character the reader accepts inside an identifier is
//! replaced by an uppercase letter (which identifiers can never contain),
//! and the result is prefixed with a tag naming the logical namespace. Both
//! steps are one-to-one, so distinct `(namespace, name)` pairs never collide
//! in the host's single flat namespace.

use std::fmt;

/// Special identifier characters and their substitutes.
///
/// The reader's identifier alphabet is derived from this table.
pub const SUBSTITUTIONS: [(char, char); 14] = [
    ('-', 'H'),
    ('&', 'A'),
    ('!', 'B'),
    (':', 'C'),
    ('.', 'D'),
    ('=', 'E'),
    ('>', 'G'),
    ('<', 'L'),
    ('%', 'N'),
    ('+', 'P'),
    ('?', 'Q'),
    ('/', 'S'),
    ('*', 'T'),
    ('#', 'O'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    Variable,
    Function,
    Slot,
    Method,
    KeywordArg,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Self::Variable,
        Self::Function,
        Self::Slot,
        Self::Method,
        Self::KeywordArg,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Variable => "_v_",
            Self::Function => "_f_",
            Self::Slot => "_s_",
            Self::Method => "_m_",
            Self::KeywordArg => "_k_",
        }
    }

    pub fn mangle(self, name: &str) -> String {
        mangle(self, name)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable => write!(f, "variable"),
            Self::Function => write!(f, "function"),
            Self::Slot => write!(f, "slot"),
            Self::Method => write!(f, "method"),
            Self::KeywordArg => write!(f, "keyword argument"),
        }
    }
}

pub fn is_special_char(ch: char) -> bool {
    SUBSTITUTIONS.iter().any(|(special, _)| *special == ch)
}

pub fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || is_special_char(ch)
}

fn substitute(ch: char) -> char {
    SUBSTITUTIONS
        .iter()
        .find(|(special, _)| *special == ch)
        .map_or(ch, |(_, substitute)| *substitute)
}

fn restore(ch: char) -> Option<char> {
    if ch.is_ascii_uppercase() {
        SUBSTITUTIONS
            .iter()
            .find(|(_, substitute)| *substitute == ch)
            .map(|(special, _)| *special)
    } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
        Some(ch)
    } else {
        None
    }
}

pub fn mangle(namespace: Namespace, name: &str) -> String {
    let prefix = namespace.prefix();
    let mut mangled = String::with_capacity(prefix.len() + name.len());
    mangled.push_str(prefix);
    mangled.extend(name.chars().map(substitute));
    mangled
}

/// Inverse of [`mangle`]; `None` if `mangled` is not a mangled identifier.
pub fn demangle(mangled: &str) -> Option<(Namespace, String)> {
    let namespace = Namespace::ALL
        .into_iter()
        .find(|namespace| mangled.starts_with(namespace.prefix()))?;
    let name = mangled[namespace.prefix().len() ..]
        .chars()
        .map(restore)
        .collect::<Option<String>>()?;
    Some((namespace, name))
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::{Namespace, SUBSTITUTIONS, demangle, is_identifier_char, mangle};

    fn alphabet() -> Vec<char> {
        ('a' ..= 'z')
            .chain('0' ..= '9')
            .chain(SUBSTITUTIONS.iter().map(|(special, _)| *special))
            .collect()
    }

    #[test]
    fn mangles_special_characters() {
        assert_eq!(mangle(Namespace::Function, "%%make-compound"), "_f_NNmakeHcompound");
        assert_eq!(mangle(Namespace::Variable, "a->b?"), "_v_aHGbQ");
        assert_eq!(mangle(Namespace::KeywordArg, "file"), "_k_file");
        assert_eq!(mangle(Namespace::Slot, "#!x"), "_s_OBx");
        assert_eq!(mangle(Namespace::Method, "<=*/"), "_m_LETS");
    }

    #[test]
    fn substitutes_are_distinct_uppercase_letters() {
        let substitutes: HashSet<char> =
            SUBSTITUTIONS.iter().map(|(_, substitute)| *substitute).collect();
        assert_eq!(substitutes.len(), SUBSTITUTIONS.len());
        assert!(substitutes.iter().all(char::is_ascii_uppercase));
        assert!(SUBSTITUTIONS.iter().all(|(special, _)| is_identifier_char(*special)));
    }

    #[test]
    fn mangling_is_injective_over_short_names() {
        let alphabet = alphabet();
        let mut names = Vec::new();
        for first in &alphabet {
            names.push(first.to_string());
            for second in &alphabet {
                names.push(format!("{first}{second}"));
            }
        }

        let mut seen = HashSet::new();
        for namespace in Namespace::ALL {
            for name in &names {
                let mangled = mangle(namespace, name);
                assert!(seen.insert(mangled.clone()), "collision on {mangled}");
            }
        }
        assert_eq!(seen.len(), names.len() * Namespace::ALL.len());
    }

    #[test]
    fn demangle_inverts_mangle() {
        for namespace in Namespace::ALL {
            let name = "%%append-compounds&all-keys:#!?";
            assert_eq!(
                demangle(&mangle(namespace, name)),
                Some((namespace, name.to_owned())),
            );
        }
        assert_eq!(demangle("_key_"), None);
        assert_eq!(demangle("_v_a_b"), None);
    }
}
