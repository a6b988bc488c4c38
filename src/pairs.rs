use crate::{common::*, config::Config, params};

/// A content image and a style image to combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub content: PathBuf,
    pub style: PathBuf,
}

pub fn list_images<P>(dir: P) -> Fallible<Vec<PathBuf>>
where
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    ensure!(dir.is_dir(), "{} is not a directory", dir.display());

    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let mut paths = vec![];
    for ext in params::IMAGE_EXTENSIONS {
        for case in [ext.to_string(), ext.to_uppercase()] {
            let pattern = format!("{}/*.{}", escaped_dir, case);
            for entry in glob::glob(&pattern)? {
                paths.push(entry?);
            }
        }
    }
    paths.sort();
    paths.dedup();

    Ok(paths)
}

/// Every style image crossed with every content image, where a configured
/// file name narrows its side to that one image.
pub fn discover_pairs(config: &Config) -> Fallible<Vec<ImagePair>> {
    let contents = match &config.content_image {
        Some(name) => vec![config.content_dir.join(name)],
        None => list_images(&config.content_dir)?,
    };
    let styles = match &config.style_image {
        Some(name) => vec![config.style_dir.join(name)],
        None => list_images(&config.style_dir)?,
    };

    ensure!(
        !contents.is_empty(),
        "no content image found in {}",
        config.content_dir.display()
    );
    ensure!(
        !styles.is_empty(),
        "no style image found in {}",
        config.style_dir.display()
    );

    let pairs = styles
        .into_iter()
        .cartesian_product(contents)
        .map(|(style, content)| ImagePair { content, style })
        .collect();
    Ok(pairs)
}
