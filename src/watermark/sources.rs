use tracing::{debug, info};

use super::WatermarkError;
use super::types::SourceImage;

/// MIME types accepted as batch inputs.
pub const ACCEPTED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

pub fn is_accepted(name: &str) -> bool {
    mime_guess::from_path(name)
        .iter()
        .any(|mime| ACCEPTED_TYPES.contains(&mime.essence_str()))
}

/// Ordered pictures waiting to be watermarked. Only changes through `add_files`,
/// `remove` and `clear`.
#[derive(Debug, Clone, Default)]
pub struct SourceList {
    images: Vec<SourceImage>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the accepted files, in order, and returns how many were kept.
    /// Duplicates are allowed. Fails when nothing in `files` is an accepted image.
    pub fn add_files<I, N, B>(&mut self, files: I) -> Result<usize, WatermarkError>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let mut added = 0;
        for (name, bytes) in files {
            let name = name.into();
            if !is_accepted(&name) {
                debug!("Skipping {}: not a supported image type", name);
                continue;
            }
            self.images.push(SourceImage::new(name, bytes));
            added += 1;
        }

        if added == 0 {
            return Err(WatermarkError::validation("no valid image files selected"));
        }
        info!("Added {} file(s), {} queued", added, self.images.len());
        Ok(added)
    }

    pub fn remove(&mut self, index: usize) -> Option<SourceImage> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SourceImage> {
        self.images.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceImage> {
        self.images.iter()
    }
}

impl<'a> IntoIterator for &'a SourceList {
    type Item = &'a SourceImage;
    type IntoIter = std::slice::Iter<'a, SourceImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_types() {
        assert!(is_accepted("holiday.JPG"));
        assert!(is_accepted("holiday.jpeg"));
        assert!(is_accepted("scan.png"));
        assert!(is_accepted("anim.gif"));
        assert!(is_accepted("modern.webp"));
        assert!(!is_accepted("vector.svg"));
        assert!(!is_accepted("notes.txt"));
        assert!(!is_accepted("no_extension"));
    }

    #[test]
    fn test_add_files_filters_and_keeps_order() {
        let mut list = SourceList::new();
        let added = list
            .add_files(vec![
                ("b.png", vec![1u8]),
                ("readme.md", vec![2u8]),
                ("a.jpg", vec![3u8]),
                ("b.png", vec![4u8]),
            ])
            .unwrap();

        assert_eq!(added, 3);
        let names: Vec<&str> = list.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b.png", "a.jpg", "b.png"]);
    }

    #[test]
    fn test_add_files_without_images_is_rejected() {
        let mut list = SourceList::new();
        let err = list
            .add_files(vec![("a.txt", Vec::<u8>::new()), ("b.pdf", Vec::new())])
            .unwrap_err();
        assert!(matches!(err, WatermarkError::Validation(_)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_by_index() {
        let mut list = SourceList::new();
        list.add_files(vec![("1.png", vec![1u8]), ("2.png", vec![2u8]), ("3.png", vec![3u8])])
            .unwrap();

        let removed = list.remove(1).unwrap();
        assert_eq!(removed.name, "2.png");
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().name, "3.png");
        assert!(list.remove(5).is_none());

        list.clear();
        assert!(list.is_empty());
    }
}
