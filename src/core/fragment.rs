//! Assembles a file from ordered [Fragment]s.

use crate::core::resource::Fragment;
use crate::error::{Error, Result};

/// The order of the fragment that opens a file.
pub const HEADER_ORDER: u8 = 1;

/// The order of the fragment that closes a file.
pub const FOOTER_ORDER: u8 = 99;

/// The lowest order available to fragments other than the header.
pub const MIN_BODY_ORDER: u8 = HEADER_ORDER + 1;

/// The highest order available to fragments other than the footer.
pub const MAX_BODY_ORDER: u8 = FOOTER_ORDER - 1;

/// Concatenates the content of `fragments`, sorted by ascending order.
///
/// Fragments with equal orders are sorted by name, so the result never depends on the order in
/// which fragments were declared. Names are unique within a catalog, which makes the sort total.
///
/// ```
/// # use sysadmin::core::fragment::assemble;
/// # use sysadmin::core::resource::Fragment;
/// let fragment = |name: &str, order, content: &str| Fragment {
///     target: "/home/a/.sysadminrc".into(),
///     name: name.into(),
///     order,
///     content: content.into(),
/// };
/// let fragments = [
///     fragment("footer", 99, "esac\n"),
///     fragment("header", 1, "case $X in\n"),
///     fragment("bob", 50, "bob) ;;\n"),
/// ];
/// assert_eq!("case $X in\nbob) ;;\nesac\n", assemble(&fragments));
/// ```
pub fn assemble<'a>(fragments: impl IntoIterator<Item = &'a Fragment>) -> String {
    let mut sorted: Vec<&Fragment> = fragments.into_iter().collect();
    sorted.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
    sorted.iter().map(|f| f.content.as_str()).collect()
}

/// Checks that a body fragment stays strictly between the header and the footer.
pub fn check_body_order(name: &str, order: u8) -> Result<()> {
    if (MIN_BODY_ORDER..=MAX_BODY_ORDER).contains(&order) {
        Ok(())
    } else {
        Err(Error::FragmentOrder {
            name: name.to_string(),
            order,
            min: MIN_BODY_ORDER,
            max: MAX_BODY_ORDER,
        })
    }
}
