use std::net::SocketAddr;

use tokio::net::TcpListener;
use vuload_testserver::{
    PATH_FAIL, PATH_HELLO, PATH_LOGIN, PATH_ORDER_BY_ID, PATH_ORDERS, PATH_PACED, PATH_SLOW,
    ServerState, VALID_PASSWORD, router,
};

const USAGE: &str = "vuload-testserver\n\nUSAGE:\n  vuload-testserver [--bind 127.0.0.1:0] [--quiet]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready, then the route table to stderr unless --quiet.";

struct Args {
    bind: SocketAddr,
    quiet: bool,
}

enum Parsed {
    Run(Args),
    Help,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> anyhow::Result<Parsed> {
    let mut args = Args {
        bind: SocketAddr::from(([127, 0, 0, 1], 0)),
        quiet: false,
    };

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--bind" => {
                let value = raw
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:8080"))?;
                args.bind = value
                    .parse()
                    .map_err(|err| anyhow::anyhow!("invalid --bind `{value}`: {err}"))?;
            }
            "-q" | "--quiet" => args.quiet = true,
            "-h" | "--help" => return Ok(Parsed::Help),
            other => anyhow::bail!("unknown argument: {other}\n\n{USAGE}"),
        }
    }

    Ok(Parsed::Run(args))
}

fn print_routes(base_url: &str) {
    eprintln!("routes:");
    eprintln!("  POST {PATH_LOGIN}  (any email, password \"{VALID_PASSWORD}\")");
    eprintln!("  GET  {PATH_ORDERS}  (bearer)");
    eprintln!("  POST {PATH_ORDERS}  (bearer, quantity > 0)");
    eprintln!("  GET  {PATH_ORDER_BY_ID}  (bearer)");
    eprintln!("  GET  {PATH_HELLO}, {PATH_PACED}, {PATH_SLOW}, {PATH_FAIL}");
    eprintln!();
    eprintln!("try: vuload run --config <file> --base-url {base_url} --auth-password {VALID_PASSWORD}");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args().skip(1))? {
        Parsed::Run(args) => args,
        Parsed::Help => {
            eprintln!("{USAGE}");
            return Ok(());
        }
    };

    let listener = TcpListener::bind(args.bind).await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    println!("HTTP_URL={base_url}");
    if !args.quiet {
        print_routes(&base_url);
    }

    axum::serve(listener, router(ServerState::default()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
