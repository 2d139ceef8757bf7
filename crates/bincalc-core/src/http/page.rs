//! Page and snapshot bodies

use alloc::string::String;
use core::fmt::Write;

use crate::codec::ValueSnapshot;
use crate::switches::BitVector;

/// Builds the polling page around an optional hex row and its script line.
macro_rules! polling_page {
    ($hex_row:literal, $hex_script:literal) => {
        concat!(
            "<!DOCTYPE html>\n",
            "<html>\n<head>\n<title>Binary Calculator</title>\n",
            "<style>\n",
            "body { font-family: Arial; background:#222; color:#eee; }\n",
            ".box { padding:20px; background:#333; width:300px; margin:auto;\n",
            "       margin-top:40px; border-radius:10px; }\n",
            "</style>\n",
            "<script>\n",
            "function update() {\n",
            "    fetch(\"/json\")\n",
            "    .then(r => r.json())\n",
            "    .then(data => {\n",
            "        document.getElementById(\"bits\").innerText = data.bits;\n",
            "        document.getElementById(\"binary\").innerText = data.binary;\n",
            $hex_script,
            "        document.getElementById(\"decimal\").innerText = data.decimal;\n",
            "    });\n",
            "}\n",
            "setInterval(update, 300);\n",
            "</script>\n",
            "</head>\n",
            "<body onload=\"update()\">\n",
            "<div class=\"box\">\n",
            "<h2>Binary Calculator</h2>\n",
            "<p><b>Bits:</b> <span id=\"bits\">...</span></p>\n",
            "<p><b>Binary:</b> <span id=\"binary\">...</span></p>\n",
            $hex_row,
            "<p><b>Decimal:</b> <span id=\"decimal\">...</span></p>\n",
            "</div>\n</body>\n</html>\n"
        )
    };
}

pub(crate) const POLLING_PAGE_HEX: &str = polling_page!(
    "<p><b>Hex:</b> <span id=\"hex\">...</span></p>\n",
    "        document.getElementById(\"hex\").innerText = data.hex;\n"
);

pub(crate) const POLLING_PAGE: &str = polling_page!("", "");

/// `[1, 0, 1, 1, 0, 1, 0, 1]`
fn write_bit_list(out: &mut String, bits: &BitVector) -> core::fmt::Result {
    out.push('[');
    for (i, bit) in bits.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "{}", u8::from(bit))?;
    }
    out.push(']');
    Ok(())
}

/// Server-rendered page with the current values embedded.
pub(crate) fn render_snapshot_page(snapshot: &ValueSnapshot) -> String {
    let mut bits = String::new();
    let _ = write_bit_list(&mut bits, &snapshot.bits);

    let mut page = String::with_capacity(256);
    // Writing into a String cannot fail.
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html>\n<head><title>Binary Calculator</title></head>\n<body>\n\
         <h1>Binary Calculator</h1>\n\
         <p><b>Bits:</b> {bits}</p>\n\
         <p><b>Binary:</b> {binary}</p>\n",
        binary = snapshot.binary,
    );
    if let Some(hex) = &snapshot.hex {
        let _ = writeln!(page, "<p><b>Hex:</b> {hex}</p>");
    }
    let _ = write!(
        page,
        "<p><b>Decimal:</b> {}</p>\n</body>\n</html>\n",
        snapshot.decimal
    );
    page
}

/// JSON object for `/json`; `hex` only when the snapshot carries it.
pub(crate) fn snapshot_json(snapshot: &ValueSnapshot) -> String {
    let mut out = String::with_capacity(96);
    out.push_str("{\"bits\": ");
    let _ = write_bit_list(&mut out, &snapshot.bits);
    let _ = write!(
        out,
        ", \"binary\": \"{}\", \"decimal\": {}",
        snapshot.binary, snapshot.decimal
    );
    if let Some(hex) = &snapshot.hex {
        let _ = write!(out, ", \"hex\": \"{hex}\"");
    }
    out.push('}');
    out
}
