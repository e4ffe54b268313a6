use crate::error::DecodeError;
use bytes::Bytes;
use image::GenericImageView;

/// A decoded MatCap preview.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// The resource this preview is for.
    pub key: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// The encoded image, exactly as it was fetched (or read from the cache).
    pub bytes: Bytes,
}

/// Make sure `bytes` is an image we can display, recording its dimensions.
pub fn decode(key: &str, bytes: Bytes) -> Result<Preview, DecodeError> {
    let image = image::load_from_memory(&bytes).map_err(|source| DecodeError {
        key: key.to_string(),
        source,
    })?;
    let (width, height) = GenericImageView::dimensions(&image);

    Ok(Preview {
        key: key.to_string(),
        width,
        height,
        bytes,
    })
}

#[cfg(test)]
pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::new(
        width, height,
    ));
    let mut buffer = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_a_png() {
        let bytes = Bytes::from(png(16, 8));

        let got = decode("a.png", bytes.clone()).unwrap();

        assert_eq!(got.width, 16);
        assert_eq!(got.height, 8);
        assert_eq!(got.bytes, bytes);
    }

    #[test]
    fn garbage_isnt_an_image() {
        let err = decode("a.png", Bytes::from_static(b"<html>404</html>"))
            .unwrap_err();

        assert_eq!(err.key, "a.png");
    }
}
