//! The built-in preset catalog.
//!
//! Immutable sample scripts keyed by name, seeded into the editor's preset
//! menu. User-saved presets live in the [`crate::TextStore`] under
//! `preset:` keys and shadow built-ins of the same name at the API layer.

/// Built-in presets as `(name, source)` pairs, in menu order.
pub fn builtin_presets() -> &'static [(&'static str, &'static str)] {
    &[
        (
            "Hello steps",
            "let greeting = \"Hello\" + \", \" + \"steps!\";\nlog(greeting);\nlet letters = greeting.length;\n",
        ),
        (
            "Fibonacci",
            "function fib(n) {\n    if (n < 2) {\n        return n;\n    }\n    return fib(n - 1) + fib(n - 2);\n}\n\nlet answer = fib(8);\nlog(\"fib(8) =\", answer);\n",
        ),
        (
            "Counters and closures",
            "function counter(start) {\n    let n = start;\n    return function() {\n        n += 1;\n        return n;\n    };\n}\n\nlet tick = counter(10);\ntick();\ntick();\nlog(\"counter is at\", tick());\n",
        ),
        (
            "Objects and arrays",
            "let scores = [3, 9, 4];\nlet stats = { total: 0, count: len(scores) };\nfor (let i = 0; i < len(scores); i += 1) {\n    stats.total += scores[i];\n}\nlog(\"stats\", stats);\n",
        ),
        (
            "Sleepy loop",
            "let beats = [];\nfor (let i = 0; i < 3; i += 1) {\n    push(beats, i);\n    sleep(150);\n}\nlog(\"done\", beats);\n",
        ),
    ]
}

/// Looks a built-in preset up by name.
pub fn builtin_preset(name: &str) -> Option<&'static str> {
    builtin_presets()
        .iter()
        .find(|(preset_name, _)| *preset_name == name)
        .map(|(_, source)| *source)
}
