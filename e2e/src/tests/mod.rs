//! Test registry - all test cases are registered here

pub mod helpers;

use crate::runner::TestCase;
use crate::types::GatewayMode;

/// Build and return all test cases
///
/// Each test:
/// 1. Queues mock provider responses (what OpenAI / xAI would return)
/// 2. Sends a request to the REAL gateway
/// 3. Validates the response and what the providers received
pub fn all_tests() -> Vec<TestCase> {
    macro_rules! test {
        ($mode:ident, $name:expr, $desc:expr, $func:path) => {
            TestCase {
                name: $name,
                mode: GatewayMode::$mode,
                description: $desc,
                run: Box::new(|ctx| Box::pin($func(ctx))),
            }
        };
    }

    vec![
        // ── Buffered mode ─────────────────────────────────────────────────────
        test!(
            Buffered,
            "buffered/openai",
            "\"api\": \"openai\" returns the Responses API text as output_text",
            buffered::test_comment_via_openai
        ),
        test!(
            Buffered,
            "buffered/default_backend",
            "Requests without \"api\" go to xai",
            buffered::test_comment_default_backend
        ),
        test!(
            Buffered,
            "buffered/fallback_on_rate_limit",
            "OpenAI 429 falls back to xai and returns its text",
            buffered::test_fallback_on_rate_limit
        ),
        test!(
            Buffered,
            "buffered/both_failed",
            "Both providers failing returns a generic 500",
            buffered::test_both_failed
        ),
        test!(
            Buffered,
            "buffered/invalid_requests",
            "Blank input, unknown api and bad JSON are 400 without provider calls",
            buffered::test_invalid_requests
        ),
        test!(
            Buffered,
            "buffered/options",
            "OPTIONS on any path is an empty 200",
            buffered::test_options
        ),

        // ── Streaming mode ────────────────────────────────────────────────────
        test!(
            Streaming,
            "streaming/text",
            "xai deltas stream as text/plain in order",
            streaming::test_stream_text
        ),
        test!(
            Streaming,
            "streaming/openai",
            "OpenAI output_text deltas stream through",
            streaming::test_stream_openai
        ),
        test!(
            Streaming,
            "streaming/fallback_before_first_byte",
            "Failure before the first fragment switches provider",
            streaming::test_stream_fallback_before_first_byte
        ),
        test!(
            Streaming,
            "streaming/truncated_after_commit",
            "Failure after output started truncates the body, no fallback",
            streaming::test_stream_truncated_after_commit
        ),
        test!(
            Streaming,
            "streaming/all_failed",
            "All providers failing before output is a 500 detail",
            streaming::test_stream_all_failed
        ),
        test!(
            Streaming,
            "streaming/invalid_requests",
            "Empty request, bad JSON and unknown api are 400 detail",
            streaming::test_stream_invalid_requests
        ),
        test!(
            Streaming,
            "streaming/work_item",
            "Work items use the stored instruction and a rendered prompt",
            streaming::test_stream_work_item
        ),
        test!(
            Streaming,
            "streaming/get_any_path",
            "GET on any path is an empty 200",
            streaming::test_get_any_path
        ),
    ]
}
