use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use commutable::{from_js, parse_notebook, stringify_notebook_with, to_js, SerializeConfig};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <notebook.ipynb>", args[0]);
        eprintln!("Reads an nbformat v3 or v4 notebook and prints it as nbformat v4");
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    if !path.exists() {
        bail!("File not found: {:?}", path);
    }

    let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let notebook = from_js(parse_notebook(&text)?)
        .with_context(|| format!("normalizing {:?}", path))?;

    eprintln!(
        "{:?}: nbformat v{}.{}, {} cells",
        path,
        notebook.nbformat(),
        notebook.nbformat_minor(),
        notebook.len()
    );

    let output = stringify_notebook_with(&to_js(&notebook)?, &SerializeConfig::nbformat())?;
    print!("{}", output);
    Ok(())
}
