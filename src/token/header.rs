/// Extract the bearer token from request headers.
///
/// The header name is matched case-insensitively, as is the `Bearer` scheme.
pub fn parse_bearer_token<I, K, V>(headers: I) -> Option<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .into_iter()
        .find(|(name, _)| name.as_ref().eq_ignore_ascii_case("authorization"))
        .and_then(|(_, value)| {
            let value = value.as_ref().trim();
            let (scheme, token) = value.split_once(' ')?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return None;
            }
            let token = token.trim();
            (!token.is_empty()).then(|| token.to_string())
        })
}
