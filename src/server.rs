// src/server.rs

use crate::calculator::calculate;
use crate::converter::{ConvertError, Converter};
use actix_files::NamedFile;
use actix_web::{
    http::{
        header::{ContentDisposition, ContentType, DispositionParam, DispositionType},
        StatusCode,
    },
    web, App, HttpRequest, HttpResponse, HttpServer, ResponseError, Result,
};
use serde::Deserialize;

/// Fields of the calculator form on the index page.
#[derive(Deserialize, Debug, Default)]
pub struct CalcForm {
    #[serde(default)]
    pub math_str: Option<String>,
}

impl ResponseError for ConvertError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    // Details stay in the server log; callers only learn that conversion failed.
    fn error_response(&self) -> HttpResponse {
        log::error!("Conversion failed: {}", self);
        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body("Conversion failed. See the server log for details.")
    }
}

/// HTTP handler for `GET /`: the calculator form, with a result when `math_str` is set.
async fn index(query: web::Query<CalcForm>) -> HttpResponse {
    render_index(query.into_inner())
}

/// HTTP handler for `POST /`: same as `GET /` with an urlencoded body.
async fn index_submit(form: web::Form<CalcForm>) -> HttpResponse {
    render_index(form.into_inner())
}

fn render_index(form: CalcForm) -> HttpResponse {
    let math_str = form.math_str.unwrap_or_default();
    let calculated = if math_str.is_empty() {
        None
    } else {
        Some(match calculate(&math_str) {
            Ok(result) => result.to_string(),
            Err(err) => err.to_string(),
        })
    };

    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(index_page(&math_str, calculated.as_deref()))
}

fn index_page(math_str: &str, calculated: Option<&str>) -> String {
    let result_block = calculated
        .map(|text| format!("<p class=\"result\">{}</p>\n", escape_html(text)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>num2vid</title></head>
<body>
<h1>num2vid v{version}</h1>
<form method="post" action="/">
<label for="math_str">Enter a math equation:</label>
<input type="text" id="math_str" name="math_str" value="{value}" required>
<input type="submit" value="Calculate.">
</form>
{result_block}</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
        value = escape_html(math_str),
        result_block = result_block,
    )
}

/// Escapes text for use in the page body and inside quoted attribute values.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// HTTP handler for `GET /convert/{num}`.
/// Runs the encoder for `num` and sends the produced video as an attachment.
async fn convert(
    req: HttpRequest,
    num: web::Path<u64>,
    converter: web::Data<Converter>,
) -> Result<HttpResponse, actix_web::Error> {
    let num = num.into_inner();
    log::info!("Received request for num: {}", num);

    // The encoder blocks until it exits; keep it off the async workers.
    let converter = converter.get_ref().clone();
    let output_path = web::block(move || converter.convert(num)).await??;

    let file_name = output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| num.to_string());
    let named_file = NamedFile::open_async(&output_path)
        .await?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        });
    Ok(named_file.into_response(&req))
}

/// Registers the num2vid routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/", web::post().to(index_submit))
        // Only plain digit runs match; signs, fractions and words get a 404.
        .route("/convert/{num:\\d+}", web::get().to(convert));
}

/// Configures and starts the Actix web server.
///
/// # Arguments
///
/// * `host` - The host address to bind the server to.
/// * `port` - The port number to bind the server to.
/// * `converter` - The shared `Converter`, holding the config handle.
///
/// # Returns
///
/// A `std::io::Result` containing the Actix server instance if binding is successful.
pub fn run_server(
    host: String,
    port: u16,
    converter: web::Data<Converter>,
) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(converter.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
