use crate::error::{Error, Result};

/// Lovingly borrowed from the cargo crate
///
/// Joins an iterator of [std::fmt::Display]'ables into an output writable
pub(crate) fn iter_join_onto<W, I, T>(mut w: W, iter: I, delim: &str) -> std::fmt::Result
where
    W: std::fmt::Write,
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let mut it = iter.into_iter().peekable();
    while let Some(n) = it.next() {
        write!(w, "{}", n)?;
        if it.peek().is_some() {
            write!(w, "{}", delim)?;
        }
    }
    Ok(())
}

/// Lovingly borrowed from the cargo crate
///
/// Joins an iterator of [std::fmt::Display]'ables to a new [std::string::String].
pub(crate) fn iter_join<I, T>(iter: I, delim: &str) -> String
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let mut s = String::new();
    let _ = iter_join_onto(&mut s, iter, delim);
    s
}

/// Quotes `value` as an IMAP quoted string, refusing line breaks which cannot be quoted.
pub(crate) fn quote(value: &str) -> Result<String> {
    if let Some(c) = value.chars().find(|&c| c == '\n' || c == '\r') {
        return Err(Error::validation(format!(
            "invalid character in input: {:?}",
            c
        )));
    }
    Ok(format!(
        "\"{}\"",
        value.replace('\\', "\\\\").replace('"', "\\\"")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_addresses() {
        assert_eq!(iter_join(["a@x", "b@y"], ", "), "a@x, b@y");
        assert_eq!(iter_join(Vec::<u32>::new(), ","), "");
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("bob").unwrap(), "\"bob\"");
        assert_eq!(quote(r#"a"b\c"#).unwrap(), r#""a\"b\\c""#);
    }

    #[test]
    fn quote_rejects_newlines() {
        assert!(matches!(quote("a\r\nb"), Err(Error::Validation(_))));
        assert!(matches!(quote("a\nb"), Err(Error::Validation(_))));
    }
}
