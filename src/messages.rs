//! User-facing message texts.
//!
//! Every string the bot sends lives here so wording changes touch one file
//! and tests can assert on texts without a transport. Raw error details never
//! appear in these texts; they go to the logs.

use crate::output::{bytes_to_mib, ConversionResult, SessionCount, SessionStatus};
use crate::progress::ConversionProgress;
use crate::session::UserId;
use chrono::{DateTime, Utc};

pub const HELP: &str = "📖 How to use this bot:\n\n\
🔸 /start - start the conversation\n\
🔸 /help - show this help\n\
🔸 /convert - turn your collected images into a PDF\n\
🔸 /clear - delete all collected images\n\
🔸 /count - show how many images are collected\n\
🔸 /status - show bot status\n\n\
📷 Usage:\n\
1️⃣ Send one or more photos\n\
2️⃣ Use /convert to build the PDF\n\
3️⃣ Receive a high-quality PDF, one page per photo\n\n\
💡 Tips:\n\
• Photos keep the order you sent them in\n\
• Photos are straightened and resized automatically\n\
• Common image formats are supported";

pub const BUSY_INGEST: &str =
    "⏳ Please wait for the current conversion to finish before adding more images.";

pub const BUSY_CONVERT: &str = "⏳ Another conversion is already running. Please wait.";

pub const BUSY_CLEAR: &str = "⏳ Images cannot be cleared while a conversion is running.";

pub const NOTHING_TO_CONVERT: &str =
    "📷 There are no images to convert!\n\n💡 Send some photos first, then use /convert";

pub const NOTHING_TO_CLEAR: &str = "📷 There are no collected images to clear.\n\n💡 Send some photos to begin!";

pub const NOTHING_COLLECTED: &str = "📷 No images collected yet.\n\n🚀 Start by sending your photos!";

pub const DOWNLOADING: &str = "📥 Downloading image...";

pub const DOWNLOAD_FAILED: &str = "❌ Could not download the image. Please try again.";

pub const INVALID_IMAGE: &str = "❌ The file you sent is not a valid image.";

pub const INGEST_FAILED: &str = "❌ Something went wrong while handling the image. Please try again.\n\
If it keeps happening, make sure the file is a valid image.";

pub const NO_PAGES: &str = "❌ None of your images could be converted, so no PDF was created.\n\n\
Your images are still stored. Use /clear and send them again.";

pub const CONVERT_FAILED: &str = "❌ An error occurred while converting your images to PDF.\n\n\
🔧 You can try:\n\
• Checking that the images you sent are valid\n\
• Sending fewer images\n\
• Trying again in a moment\n\
• Using /clear and sending the images again";

pub const DONE: &str = "🎊 All done!\n\n\
💡 You can now:\n\
• Send new photos for another PDF\n\
• Use /help for help";

pub const APOLOGY: &str = "🔧 A temporary technical error occurred.\n\n\
🔄 Please try again.\n\n\
💡 If the problem persists:\n\
• Use /clear to reset your images\n\
• Restart the conversation with /start";

/// Welcome text, with an HTML mention of the user.
pub fn welcome(user: UserId, first_name: &str) -> String {
    format!(
        "🎉 Welcome {}!\n\n\
         🤖 I turn your photos into a PDF.\n\n\
         ✨ Features:\n\
         • Collect many photos into one document\n\
         • High-quality conversion, one page per photo\n\
         • Automatic rotation and resizing\n\n\
         📋 Commands:\n\
         • Send photos and I will collect them\n\
         • /convert - convert the photos to PDF\n\
         • /clear - delete all photos\n\
         • /count - show the photo count\n\
         • /help - show help\n\
         • /status - bot status\n\n\
         🚀 Send your photos now!",
        mention_html(user, first_name)
    )
}

/// `<a href="tg://user?id=…">name</a>` with the name HTML-escaped.
pub fn mention_html(user: UserId, first_name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user,
        escape_html(first_name)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn status(status: &SessionStatus, version: &str) -> String {
    format!(
        "📊 Bot status:\n\n\
         👤 Active users: {}\n\
         📷 Your collected images: {}\n\
         ⚡ Processing: {}\n\
         🔧 Version: v{}\n\
         ✅ Online",
        status.active_users,
        status.image_count,
        if status.busy { "in progress..." } else { "ready" },
        version
    )
}

pub fn count(count: &SessionCount) -> String {
    if count.count == 0 {
        return NOTHING_COLLECTED.to_string();
    }
    format!(
        "📊 Your images:\n\n\
         📷 Images: {}\n\
         💾 Total size: {:.1} MiB\n\
         📄 Expected PDF pages: {}\n\n\
         ⚡ Ready to convert with /convert",
        count.count,
        bytes_to_mib(count.total_bytes),
        count.count
    )
}

pub fn cleared(removed: usize) -> String {
    format!("🗑 Cleared {} images!\n\n✨ You can send new photos now.", removed)
}

pub fn image_added(count: usize, size_bytes: u64) -> String {
    format!(
        "✅ Image added!\n\n\
         📊 Stats:\n\
         • Total: {} images\n\
         • This image: {:.1} MiB\n\n\
         💡 You can:\n\
         • Send more photos\n\
         • Use /convert to build the PDF\n\
         • Use /clear to delete the images",
        count,
        bytes_to_mib(size_bytes)
    )
}

pub fn too_large(limit_bytes: u64) -> String {
    format!(
        "❌ The image is too large. The maximum allowed size is {:.0} MiB.",
        bytes_to_mib(limit_bytes)
    )
}

pub fn quota_exceeded(max_images: usize, max_bytes: u64) -> String {
    format!(
        "❌ You have reached the storage limit ({} images or {:.0} MiB).\n\n\
         💡 Use /convert to build a PDF or /clear to start over.",
        max_images,
        bytes_to_mib(max_bytes)
    )
}

/// First progress message; the estimate is about two seconds per image.
pub fn convert_started(total: usize) -> String {
    format!(
        "🔄 Converting {} images to PDF...\n\
         ⏱ Estimated time: {} seconds\n\
         📊 High quality guaranteed!",
        total,
        total * 2
    )
}

pub fn convert_progress(p: &ConversionProgress) -> String {
    format!(
        "🔄 Processing images... {}%\n\
         📷 Image {} of {}\n\
         ✅ Succeeded: {}\n\
         ⚡ Optimizing and processing...",
        p.percent(),
        p.processed,
        p.total,
        p.succeeded
    )
}

pub fn convert_finished(succeeded: usize) -> String {
    format!(
        "✅ Conversion finished!\n\
         📄 PDF created\n\
         📊 {} images converted\n\
         📤 Sending...",
        succeeded
    )
}

pub fn document_caption(result: &ConversionResult, quality: u8, at: DateTime<Utc>) -> String {
    let mut caption = format!(
        "🎉 Conversion complete!\n\n\
         📊 File details:\n\
         • Images: {}\n\
         • File size: {:.2} MiB\n\
         • Quality: high ({}%)\n\
         • Date: {} UTC\n\n\
         ✨ Your PDF is ready!",
        result.succeeded_count,
        result.size_mib(),
        quality,
        at.format("%Y-%m-%d %H:%M")
    );
    if result.failed_count > 0 {
        caption.push_str(&format!(
            "\n⚠ {} images could not be processed",
            result.failed_count
        ));
    }
    caption
}

pub fn document_filename(user: UserId, at: DateTime<Utc>) -> String {
    format!("converted_images_{}_{}.pdf", user, at.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result(succeeded: usize, failed: usize) -> ConversionResult {
        ConversionResult {
            document_bytes: vec![0; 1024 * 1024],
            succeeded_count: succeeded,
            failed_count: failed,
            total: succeeded + failed,
            errors: vec![],
            duration_ms: 10,
        }
    }

    #[test]
    fn mention_escapes_name() {
        assert_eq!(
            mention_html(UserId(5), "<b>Tom & Jerry</b>"),
            "<a href=\"tg://user?id=5\">&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;</a>"
        );
    }

    #[test]
    fn caption_mentions_failures_only_when_present() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let clean = document_caption(&result(3, 0), 95, at);
        assert!(clean.contains("• Images: 3"));
        assert!(clean.contains("1.00 MiB"));
        assert!(clean.contains("2024-03-09 14:05 UTC"));
        assert!(!clean.contains("could not be processed"));

        let partial = document_caption(&result(2, 1), 95, at);
        assert!(partial.ends_with("⚠ 1 images could not be processed"));
    }

    #[test]
    fn filename_uses_user_and_unix_time() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(
            document_filename(UserId(77), at),
            "converted_images_77_1700000000.pdf"
        );
    }

    #[test]
    fn empty_count_uses_nothing_collected_text() {
        assert_eq!(count(&SessionCount::default()), NOTHING_COLLECTED);
        let text = count(&SessionCount {
            count: 4,
            total_bytes: 3 * 1024 * 1024,
        });
        assert!(text.contains("Images: 4"));
        assert!(text.contains("3.0 MiB"));
        assert!(text.contains("Expected PDF pages: 4"));
    }

    #[test]
    fn start_message_estimates_two_seconds_per_image() {
        assert!(convert_started(7).contains("14 seconds"));
    }
}
