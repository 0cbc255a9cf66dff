// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use photo_saver::constants::{self, EncodingQuality};

#[test]
fn test_quality_preset_values() {
    assert_eq!(EncodingQuality::ALL.len(), 4);
}

#[test]
fn test_quality_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    let mut previous = 0u8;
    for preset in EncodingQuality::ALL {
        let quality = preset.jpeg_quality();
        assert!(quality > previous, "Presets should be ordered from lowest to highest");
        assert!(quality <= 100);
        previous = quality;
    }
}

#[test]
fn test_quality_preset_display_names() {
    for preset in EncodingQuality::ALL {
        assert!(!preset.display_name().is_empty());
    }
}

#[test]
fn test_custom_quality_passes_through() {
    assert_eq!(EncodingQuality::Custom(85).jpeg_quality(), 85);
    assert_eq!(EncodingQuality::Custom(100).jpeg_quality(), 100);
    // The encoder cannot go below 1 or above 100
    assert_eq!(EncodingQuality::Custom(0).jpeg_quality(), 1);
    assert_eq!(EncodingQuality::Custom(250).jpeg_quality(), 100);
    assert_eq!(EncodingQuality::Custom(85).display_name(), "Custom");
    assert!(!EncodingQuality::ALL.contains(&EncodingQuality::Custom(92)));
}

#[test]
fn test_custom_quality_serializes_with_its_value() {
    let json = serde_json::to_string(&EncodingQuality::Custom(70)).unwrap();
    assert_eq!(serde_json::from_str::<EncodingQuality>(&json).unwrap(), EncodingQuality::Custom(70));
}

#[test]
fn test_points_scale_with_shorter_side() {
    // 4 inches at 72 points per inch: 288 pixels means one pixel per point
    assert_eq!(constants::points_to_pixels(12.0, 288), 12);
    assert_eq!(constants::points_to_pixels(12.0, 2880), 120);
    assert_eq!(constants::points_to_pixels(12.0, 0), 0);
}
