// THEORY (single-pixel heuristics):
// The `Pixel` module is the smallest unit of the engine: a "dumb" container for
// one RGB pixel plus the handful of single-pixel measures the heuristics need.
// Nothing here looks at neighbors. The depth prior reads brightness through
// `luminance`, the mask-less segmentation reads `channel_mean`, and the scene
// embedding reads the normalized channels.
//
// Luminance follows Rec. 601 (the same weights used for 8-bit "L" conversion in
// common imaging libraries), rounded back to a byte when a gray image is built.

pub mod pixel {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    pub type Channel = u8;
    pub type Luminance = f64;
    pub type NormalizedChannel = f32;

    /// A single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// Perceived brightness on the 0..255 scale (Rec. 601 luma).
        pub fn luminance(&self) -> Luminance {
            0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
        }

        /// Luminance rounded and clamped into a byte.
        pub fn luma_byte(&self) -> Channel {
            self.luminance().round().clamp(0.0, 255.0) as Channel
        }

        /// Unweighted mean of the three channels on the 0..255 scale.
        pub fn channel_mean(&self) -> f64 {
            (self.red as f64 + self.green as f64 + self.blue as f64) / 3.0
        }

        /// Channels divided by 255.
        pub fn normalized(&self) -> [NormalizedChannel; 3] {
            [
                self.red as NormalizedChannel / 255.0,
                self.green as NormalizedChannel / 255.0,
                self.blue as NormalizedChannel / 255.0,
            ]
        }
    }

    impl From<&Rgb<u8>> for Pixel {
        fn from(rgb: &Rgb<u8>) -> Self {
            Pixel::new(rgb[0], rgb[1], rgb[2])
        }
    }

    /// Converts an RGB image to 8-bit luminance, pixel by pixel.
    pub fn to_luma(image: &RgbImage) -> GrayImage {
        let mut gray = GrayImage::new(image.width(), image.height());
        for (x, y, rgb) in image.enumerate_pixels() {
            gray.put_pixel(x, y, Luma([Pixel::from(rgb).luma_byte()]));
        }
        gray
    }

}
