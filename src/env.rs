//! Recognized environment variables (spec section 6.5). Read once through
//! accessor functions rather than scattered `std::env::var` calls, so a host
//! embedding this crate can stub them in tests.

/// Parses a memory-size string with an optional `k|K|M|G` suffix (spec
/// section 6.5). A bare number is taken as bytes.
pub fn parse_mem_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (digits, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'k' | b'K' => (&s[..s.len() - 1], 1024),
        b'M' => (&s[..s.len() - 1], 1024 * 1024),
        b'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

/// Search path for dynamic object libraries (`$SYS`, `$DATETIME`, ...). This
/// crate never loads them itself (spec section 1's scope note); it only
/// needs to hand the path to a `DvobjLibrary` implementor.
pub fn dvobjs_path() -> Option<String> {
    std::env::var("PURC_DVOBJS_PATH").ok()
}

pub fn jsrt_mem_limit() -> Option<u64> {
    std::env::var("PURC_ENVV_JSRT_MEM_LIMIT")
        .ok()
        .and_then(|s| parse_mem_size(&s))
}

pub fn jsrt_stack_size() -> Option<u64> {
    std::env::var("PURC_ENVV_JSRT_STACK_SIZE")
        .ok()
        .and_then(|s| parse_mem_size(&s))
}

/// Only meaningful if the (out of scope) JS module is present in the host;
/// read here only as an opaque passthrough string.
pub fn jsrt_strip_opts() -> Option<String> {
    std::env::var("PURC_ENVV_JSRT_STRIP_OPTS").ok()
}

/// The variant-level interface a dynamic object library (`$SYS`,
/// `$DATETIME`, ...) exposes to the coroutine evaluating it. Loading the
/// library itself -- from `dvobjs_path()`, as a shared object or a built-in
/// table -- is a host concern; this crate only needs something that looks
/// like one.
pub trait DvobjLibrary {
    /// The name the dvobj is bound under, e.g. `"SYS"`.
    fn name(&self) -> &str;

    /// Looks up a method/property on the dvobj by name, returning the
    /// variant it resolves to.
    fn get(&self, key: &str) -> Option<crate::variant::Variant>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!(parse_mem_size("512"), Some(512));
        assert_eq!(parse_mem_size("4k"), Some(4 * 1024));
        assert_eq!(parse_mem_size("2M"), Some(2 * 1024 * 1024));
        assert_eq!(parse_mem_size("1G"), Some(1024 * 1024 * 1024));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_mem_size(""), None);
        assert_eq!(parse_mem_size("abc"), None);
    }
}
