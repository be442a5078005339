/// Builds a [`Headers`](crate::message::headers::Headers) collection from a
/// list of [`Header`](crate::message::headers::Header) values.
#[macro_export]
macro_rules! headers {
    ($($header:expr),* $(,)?) => {{
        let mut headers = $crate::message::headers::Headers::new();
        $(headers.push($header);)*
        headers
    }};
}
