//! Renders the text templates that ship with the crate.
//!
//! Templates are shell snippets, so the syntax stays out of the shell's way: only variables that
//! are actually defined get substituted, and everything else (e.g. `$HOME`) passes through to the
//! shell untouched.

use indexmap::IndexMap;
use regex::{Captures, Regex};

/// The login shell's profile. Sources the sysadmin config file.
pub const PROFILE: &str = include_str!("../../templates/profile.sh");

/// Opens the sysadmin config file.
pub const SYSADMINRC_HEADER: &str = include_str!("../../templates/sysadminrc.header.sh");

/// One member's section of the sysadmin config file.
pub const SYSADMINRC_MEMBER: &str = include_str!("../../templates/sysadminrc.member.sh");

/// Closes the sysadmin config file.
pub const SYSADMINRC_FOOTER: &str = include_str!("../../templates/sysadminrc.footer.sh");

/// Substitutes `vars` into `template`.
///
/// There are two forms of variable substitution:
///
/// 1. Simple substitution (`$var`): any occurrence of `$var` is replaced with the variable named
///    `var`, if one exists. Matching works on word boundaries, so `$foobar` does not match the
///    variable `foo`. Use braced substitution for that: `${foo}bar`.
///
/// 2. Braced substitution (`${var}`): any occurrence of `${var}` is replaced with the variable
///    named `var`, if one exists.
///
/// All variables are substituted in a single pass. Substituted values are inserted literally and
/// are never searched for `$` references themselves.
///
/// ```
/// # use indexmap::IndexMap;
/// # use sysadmin::core::template::render;
/// let vars = IndexMap::from([("login".to_string(), "localadmin".to_string())]);
/// assert_eq!(
///     "cd /home/localadmin; echo $HOME",
///     render("cd /home/${login}; echo $HOME", &vars),
/// );
/// ```
pub fn render(template: &str, vars: &IndexMap<String, String>) -> String {
    if vars.is_empty() {
        return template.to_string();
    }

    // Matches ${<var>} or $<var> (as a whole word) for any defined var. Variable names are
    // escaped so that a name can never change the meaning of the pattern.
    let names = vars
        .keys()
        .map(|var| regex::escape(var))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\$(?:\{{({names})\}}|({names})\b)");
    let regex = Regex::new(&pattern).expect("escaped variable names always form a valid regex");
    regex
        .replace_all(template, |captures: &Captures| {
            let name = captures.get(1).or_else(|| captures.get(2));
            match name.and_then(|name| vars.get(name.as_str())) {
                Some(value) => value.clone(),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(vars: &[(&str, &str)], template: &str) -> String {
        let vars = IndexMap::from_iter(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        render(template, &vars)
    }

    #[test]
    fn simple_substitution() {
        assert_eq!("bar", render_with(&[("foo", "bar")], "$foo"));
        assert_eq!("foobar", render_with(&[("foo", "bar")], "foo$foo"));
    }

    #[test]
    fn braced_substitution() {
        assert_eq!("barbar", render_with(&[("foo", "bar")], "${foo}bar"));
    }

    #[test]
    fn simple_substitution_does_not_match_var_substrings() {
        assert_eq!("$foobar", render_with(&[("foo", "bar")], "$foobar"));
    }

    #[test]
    fn undefined_vars_pass_through() {
        assert_eq!(
            r#"[ -d "$HOME/bin" ] && echo ${SHELL:-sh}"#,
            render_with(&[("foo", "bar")], r#"[ -d "$HOME/bin" ] && echo ${SHELL:-sh}"#),
        );
    }

    #[test]
    fn values_are_inserted_literally() {
        assert_eq!("cost: $1", render_with(&[("price", "$1")], "cost: $price"));
    }

    #[test]
    fn values_are_not_substituted_again() {
        let vars = [("name", "${email}"), ("email", "a@b.c")];
        assert_eq!("${email} <a@b.c>", render_with(&vars, "$name <${email}>"));
        let vars = [("email", "a@b.c"), ("name", "$email")];
        assert_eq!("$email <a@b.c>", render_with(&vars, "${name} <$email>"));
    }

    #[test]
    fn longer_names_are_not_shadowed_by_prefixes() {
        let vars = [("foo", "1"), ("foobar", "2")];
        assert_eq!("2 1 2", render_with(&vars, "$foobar $foo ${foobar}"));
    }

    #[test]
    fn names_are_escaped() {
        assert_eq!("x", render_with(&[("a.b", "x")], "${a.b}"));
        assert_eq!("$aXb", render_with(&[("a.b", "x")], "$aXb"));
    }

    #[test]
    fn shipped_templates_reference_their_vars() {
        assert!(PROFILE.contains("${configfilename}"));
        assert!(SYSADMINRC_HEADER.contains("SYSADMIN_USER"));
        assert!(SYSADMINRC_MEMBER.contains("${username})"));
        assert!(SYSADMINRC_FOOTER.trim_end().ends_with("esac"));
    }
}
