//! Output normalization.

use crate::driver::PageDriver;
use crate::locator::FieldHandle;

/// Trim surrounding whitespace. Inner whitespace is kept as rendered, so
/// spacing defects in the output stay visible to assertions.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.trim().to_string()
}

/// Read and normalize the element behind `handle`.
///
/// A missing element or a failed read yields an empty string; the panel may
/// be replaced between resolution and read.
pub async fn read_output<P: PageDriver + ?Sized>(page: &P, handle: &FieldHandle) -> String {
    match page.text_content(&handle.target).await {
        Ok(Some(raw)) => normalize(&raw),
        Ok(None) => {
            tracing::debug!(role = %handle.role, target = %handle.target, "element gone, reading as empty");
            String::new()
        }
        Err(e) => {
            tracing::debug!(role = %handle.role, error = %e, "read failed, reading as empty");
            String::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod normalize_tests {
        use super::*;

        #[test]
        fn test_trims_outer_keeps_inner() {
            assert_eq!(normalize(" a  b "), "a  b");
            assert_eq!(normalize("\n\tමම ගෙදර   යනවා.\n"), "මම ගෙදර   යනවා.");
        }

        #[test]
        fn test_empty_and_blank() {
            assert_eq!(normalize(""), "");
            assert_eq!(normalize(" \n\t "), "");
        }

        #[test]
        fn test_inner_line_breaks_survive() {
            assert_eq!(normalize("අපි පස්සේ\n\nකතා කරමු"), "අපි පස්සේ\n\nකතා කරමු");
        }
    }

    mod read_output_tests {
        use super::*;
        use crate::clock::FakeClock;
        use crate::driver::PageDriver;
        use crate::locator::{default_strategies, FieldResolver, FieldRole, LocateOptions, Target};
        use crate::mock_page::{MockPage, MockSite};
        use std::time::Duration;

        #[tokio::test]
        async fn test_reads_padded_output_trimmed() {
            let clock = FakeClock::shared();
            let page = MockPage::new(MockSite::echo().with_padding(), clock.clone());
            let resolver = FieldResolver::new(clock.clone(), LocateOptions::default());
            let output = resolver
                .resolve(&page, FieldRole::Output, &default_strategies(FieldRole::Output), false)
                .await
                .unwrap();
            page.fill(&Target::css("textarea"), "api").await.unwrap();
            clock.advance(Duration::from_secs(1));
            assert_eq!(read_output(&page, &output).await, "api");
        }

        #[tokio::test]
        async fn test_missing_or_failing_read_is_empty() {
            let clock = FakeClock::shared();
            let page = MockPage::new(MockSite::echo().with_flaky_reads(1), clock.clone());
            let handle = FieldResolver::new(clock.clone(), LocateOptions::default())
                .resolve(&page, FieldRole::Output, &default_strategies(FieldRole::Output), false)
                .await
                .unwrap();
            assert_eq!(read_output(&page, &handle).await, "");

            let gone = crate::locator::FieldHandle {
                target: Target::css("div.removed"),
                ..handle
            };
            assert_eq!(read_output(&page, &gone).await, "");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_normalize_is_idempotent(raw in "\\PC*") {
                let once = normalize(&raw);
                prop_assert_eq!(normalize(&once), once.clone());
            }

            #[test]
            fn prop_inner_text_preserved(
                inner in "[a-z\u{0D80}-\u{0DFF}]([a-z \u{0D80}-\u{0DFF}]{0,20}[a-z\u{0D80}-\u{0DFF}])?",
                left in "[ \t\n]{0,4}",
                right in "[ \t\n]{0,4}"
            ) {
                let raw = format!("{left}{inner}{right}");
                prop_assert_eq!(normalize(&raw), inner);
            }
        }
    }
}
