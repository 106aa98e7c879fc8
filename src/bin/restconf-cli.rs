use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};

#[derive(Parser)]
#[command(name = "restconf-cli")]
#[command(about = "Command-line client for a RESTCONF server", long_about = None)]
struct Cli {
    /// API root, including the base path.
    #[arg(short, long, default_value = "http://localhost:8181/restconf")]
    url: String,

    #[arg(short, long, value_enum, default_value_t = Encoding::Json)]
    encoding: Encoding,

    /// Sent in the principal header.
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Encoding {
    Json,
    Xml,
}

impl Encoding {
    fn data(self) -> &'static str {
        match self {
            Encoding::Json => "application/yang-data+json",
            Encoding::Xml => "application/yang-data+xml",
        }
    }

    fn patch(self) -> &'static str {
        match self {
            Encoding::Json => "application/yang-patch+json",
            Encoding::Xml => "application/yang-patch+xml",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read a resource under /data
    Get { path: String },
    /// Replace or create a resource
    Put { path: String, file: PathBuf },
    /// Create a child resource or invoke an operation
    Post { path: String, file: PathBuf },
    /// Merge into a resource
    Patch {
        path: String,
        file: PathBuf,
        /// Send the file as a YANG Patch document
        #[arg(long)]
        yang_patch: bool,
    },
    /// Delete a resource
    Delete { path: String },
    /// Show the methods a resource allows
    Options { path: String },
    /// Print events from a stream, e.g. `streams/json/NETCONF`
    Listen { stream_path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let root = cli.url.trim_end_matches('/').to_string();
    let data = |path: &str| format!("{}/data/{}", root, path.trim_start_matches('/'));

    let request = |method: Method, url: String| -> RequestBuilder {
        let builder = client.request(method, url).header(ACCEPT, cli.encoding.data());
        match &cli.user {
            Some(user) => builder.header("x-remote-user", user),
            None => builder,
        }
    };

    match &cli.command {
        Commands::Get { path } => print_response(request(Method::GET, data(path)).send().await?).await?,
        Commands::Put { path, file } => {
            let body = std::fs::read(file)?;
            let res = request(Method::PUT, data(path))
                .header(CONTENT_TYPE, cli.encoding.data())
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Post { path, file } => {
            let body = std::fs::read(file)?;
            let res = request(Method::POST, data(path))
                .header(CONTENT_TYPE, cli.encoding.data())
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Patch { path, file, yang_patch } => {
            let body = std::fs::read(file)?;
            let content_type = if *yang_patch {
                cli.encoding.patch()
            } else {
                cli.encoding.data()
            };
            let res = request(Method::PATCH, data(path))
                .header(CONTENT_TYPE, content_type)
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Delete { path } => {
            print_response(request(Method::DELETE, data(path)).send().await?).await?
        }
        Commands::Options { path } => {
            let res = request(Method::OPTIONS, data(path)).send().await?;
            println!("{}", res.status());
            for name in ["allow", "accept-patch"] {
                if let Some(value) = res.headers().get(name) {
                    println!("{}: {}", name, value.to_str().unwrap_or_default());
                }
            }
        }
        Commands::Listen { stream_path } => {
            let url = format!("{}/{}", root, stream_path.trim_start_matches('/'));
            let res = client
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            listen(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    } else {
        println!("{}", status);
    }
    if let Some(location) = res.headers().get("location") {
        println!("Location: {}", location.to_str().unwrap_or_default());
    }
    let text = res.text().await?;
    if !text.is_empty() {
        println!("{}", text);
    }
    Ok(())
}

/// Print each SSE event's data, joining its `data:` lines.
async fn listen(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let mut chunks = res.bytes_stream();
    let mut buffer = String::new();
    let mut event = String::new();
    while let Some(chunk) = chunks.next().await {
        buffer.push_str(&String::from_utf8_lossy(&chunk?));
        while let Some(end) = buffer.find('\n') {
            let line: String = buffer.drain(..=end).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                event.push_str(data.strip_prefix(' ').unwrap_or(data));
            } else if line.is_empty() && !event.is_empty() {
                println!("{}", event);
                event.clear();
            }
        }
    }
    Ok(())
}
