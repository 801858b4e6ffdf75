/// Clean an article body before it is stored.
///
/// Whitelist-based: formatting tags (<b>, <p>, <a>, lists, headings) are kept,
/// while <script>, <iframe>, event-handler attributes and `javascript:` links
/// are stripped. Bodies are rendered unescaped on article pages, so every
/// write path must go through here.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
