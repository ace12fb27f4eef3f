//! Wraps a module's source in a registration call

use std::borrow::Cow;

use super::runtime::REGISTER_FN;
use crate::util::lua_string_literal;

/// A module as it appears in the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedModule {
    pub text: String,
    /// Offset of the module's first source line from the wrapper's first line
    pub body_offset: usize,
    /// Number of source lines inside the wrapper
    pub line_count: usize,
}

/// Replace a leading `#!` line with an empty one so later lines keep their numbers
pub fn strip_shebang(source: &str) -> Cow<'_, str> {
    if !source.starts_with("#!") {
        return Cow::Borrowed(source);
    }
    match source.find('\n') {
        Some(newline) => Cow::Owned(source[newline..].to_string()),
        None => Cow::Borrowed(""),
    }
}

pub fn wrap_module(canonical_name: &str, source: &str) -> WrappedModule {
    let body = strip_shebang(source);
    let mut text = format!(
        "{REGISTER_FN}({}, function(require, ...)\n",
        lua_string_literal(canonical_name)
    );
    text.push_str(&body);
    if !body.is_empty() && !body.ends_with('\n') {
        text.push('\n');
    }
    text.push_str("end)\n");

    WrappedModule {
        text,
        body_offset: 1,
        line_count: body.lines().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_in_function() {
        let wrapped = wrap_module("Utils", "return {}");
        assert_eq!(
            wrapped.text,
            "__bundle_register(\"Utils\", function(require, ...)\nreturn {}\nend)\n"
        );
        assert_eq!(wrapped.line_count, 1);
    }

    #[test]
    fn test_trailing_line_comment_is_closed() {
        let wrapped = wrap_module("m", "return 1 -- done");
        assert!(wrapped.text.ends_with("-- done\nend)\n"));
    }

    #[test]
    fn test_shebang_keeps_line_numbers() {
        assert_eq!(strip_shebang("#!/usr/bin/lua\nprint(1)"), "\nprint(1)");
        assert_eq!(strip_shebang("#!/usr/bin/lua"), "");
        assert_eq!(strip_shebang("print(1)"), "print(1)");

        let wrapped = wrap_module("main", "#!/usr/bin/lua\nprint(1)\n");
        assert_eq!(wrapped.line_count, 2);
        assert!(!wrapped.text.contains("#!"));
    }

    #[test]
    fn test_empty_module() {
        let wrapped = wrap_module("empty", "");
        assert_eq!(wrapped.line_count, 0);
        assert!(wrapped.text.ends_with("function(require, ...)\nend)\n"));
    }
}
