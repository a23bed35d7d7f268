use crate::session::{PageView, ResultPanel};

const STYLE: &str = include_str!("../assets/style.css");

pub const TITLE: &str = "Papaya Ripeness Classifier";
pub const START_PROMPT: &str =
    "📱 Select or take a photo of a papaya to start classifying its ripeness.";
pub const NO_IMAGE_PROMPT: &str = "⚠️ Select or take a photo first!";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn render_result(result: &ResultPanel) -> String {
    match result {
        ResultPanel::Success { label, confidence } => format!(
            r#"<div class="result-success">✅ Result: {} ({:.2}%)</div>"#,
            escape_html(&label.to_uppercase()),
            confidence * 100.
        ),
        ResultPanel::Error(message) => format!(
            r#"<div class="result-error">❌ {}</div>"#,
            escape_html(message)
        ),
        ResultPanel::Info(message) => {
            format!(r#"<div class="result-info">{}</div>"#, escape_html(message))
        }
    }
}

pub fn render_page(view: &PageView, accept: &str) -> String {
    let preview = if view.has_image {
        format!(
            r#"<figure class="preview"><img src="/image?v={}" alt="Image preview"><figcaption>Image preview</figcaption></figure>"#,
            view.image_version
        )
    } else {
        String::new()
    };

    let result = match &view.result {
        Some(result) => render_result(result),
        None if !view.has_image => render_result(&ResultPanel::Info(START_PROMPT.to_string())),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<div class="papaya-container">
<h1 class="papaya-title">🍈 {title}</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
<label class="picker">📷 Take a photo
<input type="file" name="camera" accept="image/*" capture="environment" onchange="this.form.submit()">
</label>
<label class="picker">🖼 Choose from gallery
<input type="file" name="file" accept="{accept}" onchange="this.form.submit()">
</label>
<noscript><button type="submit">⬆️ Upload</button></noscript>
</form>
{preview}
<form action="/predict" method="post">
<button type="submit">🔍 Predict</button>
</form>
{result}
</div>
</body>
</html>
"#,
        title = TITLE,
        style = STYLE,
        accept = escape_html(accept),
        preview = preview,
        result = result,
    )
}
