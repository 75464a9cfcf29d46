//! Name normalisation and pattern substitution.
//!
//! Controller class names and directories are derived from patterns with two
//! tokens:
//!
//! | Token | Replaced by |
//! |-------|-------------|
//! | `%Module%` | the module name, title-cased |
//! | `%Controller%` | the controller name, title-cased |
//!
//! Title-casing splits on `-` and `_`, lower-cases each segment, upper-cases
//! its first letter and joins without separators: `controller-test` becomes
//! `ControllerTest`, `tESt` becomes `Test`.

/// Token for the module name in patterns.
pub const MODULE_TOKEN: &str = "%Module%";
/// Token for the controller name in patterns.
pub const CONTROLLER_TOKEN: &str = "%Controller%";
/// Separator between namespace segments of a class name.
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Title-cases each `-`/`_` delimited segment and removes the separators.
pub fn title_case(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let lower = segment.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Normalises an action name for lookup: lower-cased, separators removed.
pub fn action_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Substitutes both tokens in `pattern`. Either token may appear any number
/// of times, including not at all.
pub fn substitute(pattern: &str, module: &str, controller: &str) -> String {
    pattern
        .replace(MODULE_TOKEN, &title_case(module))
        .replace(CONTROLLER_TOKEN, &title_case(controller))
}

/// Builds a fully qualified controller class name from `pattern`.
///
/// The result always starts with exactly one namespace separator.
///
/// ```rust
/// use switchyard_dispatch::naming::controller_class_name;
///
/// let class = controller_class_name(r"%Module%\%Controller%Controller", "test", "controller-test");
/// assert_eq!(class, r"\Test\ControllerTestController");
/// ```
pub fn controller_class_name(pattern: &str, module: &str, controller: &str) -> String {
    let substituted = substitute(pattern, module, controller);
    qualify(&substituted)
}

/// Prefixes a class name with the namespace separator if it lacks one.
pub fn qualify(class_name: &str) -> String {
    format!(
        "{}{}",
        NAMESPACE_SEPARATOR,
        class_name.trim_start_matches(NAMESPACE_SEPARATOR)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("test"), "Test");
        assert_eq!(title_case("tESt"), "Test");
        assert_eq!(title_case("controller-test"), "ControllerTest");
        assert_eq!(title_case("conTroller--Test"), "ControllerTest");
        assert_eq!(title_case("blog_post"), "BlogPost");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_action_key() {
        assert_eq!(action_key("show-all"), "showall");
        assert_eq!(action_key("Show_All"), "showall");
        assert_eq!(action_key("index"), "index");
    }

    #[test]
    fn test_controller_class_name_patterns() {
        let cases = [
            (r"%Module%\%Controller%Controller", "test", "controller-test", r"\Test\ControllerTestController"),
            (
                r"MyModules\%Module%\%Controller%\%Controller%Controller",
                "test",
                "controller-test",
                r"\MyModules\Test\ControllerTest\ControllerTestController",
            ),
            (r"MyModules\Controller", "test", "controller-test", r"\MyModules\Controller"),
            (r"My%Controller%s\%Module%", "test", "controller-test", r"\MyControllerTests\Test"),
            (r"%Module%\%Controller%", "tESt", "conTroller--Test", r"\Test\ControllerTest"),
        ];

        for (pattern, module, controller, expected) in cases {
            assert_eq!(
                controller_class_name(pattern, module, controller),
                expected,
                "pattern {pattern}"
            );
        }
    }

    #[test]
    fn test_qualify_does_not_double_prefix() {
        assert_eq!(qualify(r"\Blog\PostController"), r"\Blog\PostController");
        assert_eq!(qualify(r"Blog\PostController"), r"\Blog\PostController");
    }

    proptest! {
        #[test]
        fn prop_class_name_is_deterministic(
            pattern in r"[A-Za-z\\%]{0,24}",
            module in "[a-zA-Z_-]{0,12}",
            controller in "[a-zA-Z_-]{0,12}",
        ) {
            let first = controller_class_name(&pattern, &module, &controller);
            let second = controller_class_name(&pattern, &module, &controller);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with(NAMESPACE_SEPARATOR));
        }

        #[test]
        fn prop_title_case_has_no_separators(name in "[a-zA-Z_-]{0,16}") {
            let titled = title_case(&name);
            prop_assert!(!titled.contains('-'));
            prop_assert!(!titled.contains('_'));
            prop_assert_eq!(title_case(&titled.to_lowercase()).to_lowercase(), titled.to_lowercase());
        }
    }
}
