//! Server-rendered pages for the human-facing routes.

use crate::output::ConversionReport;
use crate::types::Currency;

/// Values echoed back into the converter form.
#[derive(Debug, Default, Clone)]
pub struct FormValues {
    pub amount: String,
    pub in_currency: String,
    pub out_currency: String,
}

pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
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

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Currency Converter</title>
</head>
<body>
<nav><a href="/converter">Converter</a> | <a href="/currencies">Currencies</a> | <a href="/about">About</a></nav>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

pub fn about() -> String {
    layout(
        "About",
        r#"<p>Converts amounts between currencies using exchange rates from
<a href="https://openexchangerates.org">Open Exchange Rates</a> or conversions from
<a href="https://www.xe.com">XE</a>. If one method fails, the other is tried.</p>
<p>JSON API: <code>/currency_converter?amount=100&amp;input_currency=USD&amp;output_currency=EUR</code>
with an optional <code>converter=xe|oer</code>. Leave out <code>output_currency</code> to convert
to every enabled currency.</p>"#,
    )
}

pub fn currencies(list: &[Currency]) -> String {
    let mut rows = String::new();
    for currency in list {
        let symbols = currency
            .symbols
            .iter()
            .map(|s| escape(s))
            .collect::<Vec<_>>()
            .join(" ");
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&currency.code),
            symbols,
            escape(&currency.name)
        ));
    }
    layout(
        "Currencies",
        &format!(
            "<table>\n<tr><th>Code</th><th>Symbol</th><th>Name</th></tr>\n{}</table>",
            rows
        ),
    )
}

pub fn message(title: &str, message: &str) -> String {
    layout(title, &format!("<p class=\"error\">{}</p>", escape(message)))
}

pub fn converter(
    form: &FormValues,
    converted: Option<&ConversionReport>,
    message: Option<&str>,
) -> String {
    let mut body = format!(
        r#"<form method="post" action="/converter">
<label>Amount: <input name="amount" value="{}" required></label>
<label>From: <input name="in_currency" value="{}" required></label>
<label>To: <input name="out_currency" value="{}"></label>
<button type="submit">Convert</button>
</form>
"#,
        escape(&form.amount),
        escape(&form.in_currency),
        escape(&form.out_currency)
    );

    if let Some(message) = message {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", escape(message)));
    }

    if let Some(report) = converted {
        body.push_str(&format!(
            "<p>{} {} ({} method)</p>\n<table>\n",
            report.input.amount,
            escape(&report.input.currency),
            report.converter
        ));
        for (code, amount) in &report.output {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(code),
                amount
            ));
        }
        body.push_str("</table>\n");
    }

    layout("Converter", &body)
}
