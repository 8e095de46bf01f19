// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

/// Render `error` with its chain of causes, the outermost cause first.
pub fn create_error_message(error: anyhow::Error) -> String {
    let causes = error
        .chain()
        .skip(1)
        .map(|cause| format!("{cause}"))
        .collect::<Vec<_>>();
    if causes.is_empty() {
        return format!("{error}");
    }
    let msg = format!("Caused by:\n  {:}", causes.join("\n  "));
    format!("{error}\n{msg}")
}
