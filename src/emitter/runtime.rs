//! On-demand runtime helper snippets.
//!
//! Each snippet is pulled into the declaration list at most once, the first
//! time something the emitter is producing needs it — mirroring the way the
//! rest of this crate treats its own `TypeInterner` table: request by name,
//! get back a shared, deduplicated definition.

/// Stable keys identifying a runtime helper. Kept as an enum rather than bare
/// strings so a typo in a call site is a compile error, not a missing symbol
/// at C-compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    AssertBounds,
    Noinline,
    Noreturn,
    Any,
    NilType,
    String,
    StringConcat,
    StaticAssertPtr,
}

impl Helper {
    pub fn source(self) -> &'static str {
        match self {
            Helper::Noinline => "#define nl_noinline __attribute__((noinline))\n",
            Helper::Noreturn => "#define nl_noreturn __attribute__((noreturn))\n",
            Helper::AssertBounds => concat!(
                "static inline nl_noinline void nl_assert_bounds_(",
                "intptr_t index, intptr_t len, const char *file, int line) {\n",
                "    if (index < 0 || index >= len) {\n",
                "        fprintf(stderr, \"%s:%d: array index %lld out of bounds (len %lld)\\n\",",
                " file, line, (long long)index, (long long)len);\n",
                "        abort();\n",
                "    }\n",
                "}\n",
            ),
            Helper::Any => concat!(
                "typedef struct nlany {\n",
                "    void *value;\n",
                "    const char *typecodename;\n",
                "} nlany;\n",
            ),
            Helper::NilType => "typedef struct { char unused; } nlniltype;\nstatic const nlniltype nlnil = {0};\n",
            Helper::String => concat!(
                "typedef struct nlstring {\n",
                "    const char *data;\n",
                "    size_t len;\n",
                "} nlstring;\n",
                "static inline nlstring nlstr_lit(const char *data, size_t len) {\n",
                "    nlstring s; s.data = data; s.len = len; return s;\n",
                "}\n",
            ),
            Helper::StaticAssertPtr => "static_assert(sizeof(void*) == sizeof(void*), \"pointer size sanity check\");\n",
            Helper::StringConcat => concat!(
                "static inline nlstring nlstr_concat(nlstring a, nlstring b) {\n",
                "    size_t len = a.len + b.len;\n",
                "    char *buf = malloc(len + 1);\n",
                "    memcpy(buf, a.data, a.len);\n",
                "    memcpy(buf + a.len, b.data, b.len);\n",
                "    buf[len] = '\\0';\n",
                "    nlstring s; s.data = buf; s.len = len; return s;\n",
                "}\n",
            ),
        }
    }

    /// Helpers this one depends on, emitted first.
    pub fn deps(self) -> &'static [Helper] {
        match self {
            Helper::AssertBounds => &[Helper::Noinline],
            Helper::StringConcat => &[Helper::String],
            _ => &[],
        }
    }
}
