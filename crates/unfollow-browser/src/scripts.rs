//! Page scripts. Each is a WebDriver `execute/sync` function body.

use crate::driver::ControlLocator;

/// Phrases the remote UI shows in place of a deleted or blocked profile.
pub const UNAVAILABLE_PHRASES: [&str; 3] = [
    "Profile isn't available",
    "Sorry, this page isn't available",
    "The link may be broken",
];

/// Returns `true` when the page text carries a profile-gone phrase.
pub fn profile_gone() -> String {
    let phrases = serde_json::to_string(&UNAVAILABLE_PHRASES).unwrap_or_else(|_| "[]".into());
    format!(
        r#"const text = (document.body && document.body.innerText) || '';
return {phrases}.some(p => text.includes(p));"#
    )
}

/// Returns `following`, `not_following` or `unknown` from the first button
/// (native or `role=button`) that reads "Following" or exactly "Follow".
pub const RELATIONSHIP: &str = r#"
for (const selector of ['button', 'div[role="button"]']) {
  for (const el of document.querySelectorAll(selector)) {
    const text = (el.textContent || '').trim();
    if (text.includes('Following')) return 'following';
    if (text === 'Follow') return 'not_following';
  }
}
return 'unknown';
"#;

/// Returns `true` once the signed-in navigation is present.
pub const LOGGED_IN: &str = r#"
return document.querySelector('svg[aria-label="Home"]') !== null
  || document.querySelector('a[href="/direct/inbox/"]') !== null;
"#;

pub fn scroll_by(pixels: u32) -> String {
    format!("window.scrollBy({{ top: {pixels}, left: 0, behavior: 'smooth' }}); return true;")
}

pub const FOLLOWING_BUTTON: ControlLocator = ControlLocator {
    name: "following button",
    find: r#"(() => {
  for (const selector of ['button', 'div[role="button"]']) {
    for (const el of document.querySelectorAll(selector)) {
      if ((el.textContent || '').includes('Following')) return el;
    }
  }
  return null;
})()"#,
};

pub const UNFOLLOW_CONFIRM: ControlLocator = ControlLocator {
    name: "unfollow confirmation",
    find: r#"(() => {
  for (const el of document.querySelectorAll('button')) {
    if ((el.textContent || '').trim() === 'Unfollow') return el;
  }
  for (const span of document.querySelectorAll('button span, div[role="button"] span')) {
    if ((span.textContent || '').trim() === 'Unfollow') {
      return span.closest('button, div[role="button"]');
    }
  }
  return null;
})()"#,
};

/// Pointer events around a click at a random point inside the element,
/// finishing with a plain `click()`.
pub fn human_click(locator: &ControlLocator) -> String {
    format!(
        r#"const el = {find};
if (!el) return false;
const rect = el.getBoundingClientRect();
const x = rect.left + rect.width * (0.3 + Math.random() * 0.4);
const y = rect.top + rect.height * (0.3 + Math.random() * 0.4);
const fire = (type, extra) => el.dispatchEvent(new MouseEvent(type, Object.assign({{
  bubbles: true, cancelable: true, view: window, clientX: x, clientY: y
}}, extra || {{}})));
fire('mouseenter');
for (let i = 0; i < 3; i++) {{
  fire('mousemove', {{ clientX: x + (Math.random() - 0.5) * 5, clientY: y + (Math.random() - 0.5) * 5 }});
}}
fire('mousedown', {{ button: 0, buttons: 1 }});
if (el.focus) el.focus();
setTimeout(() => {{
  fire('mouseup', {{ button: 0 }});
  fire('click', {{ button: 0 }});
  el.click();
}}, 50 + Math.random() * 100);
return true;"#,
        find = locator.find
    )
}

/// Injected before any page script on every navigation.
pub const STEALTH: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
try { delete Object.getPrototypeOf(navigator).webdriver; } catch (e) {}

const pdf = {
  0: { type: 'application/pdf', suffixes: 'pdf', description: 'Portable Document Format' },
  length: 1, name: 'PDF Viewer', description: 'Portable Document Format', filename: 'internal-pdf-viewer',
  item(i) { return this[i]; }, namedItem(n) { return this[n]; }
};
Object.defineProperty(navigator, 'plugins', {
  get: () => { const p = [pdf]; p.item = i => p[i]; p.namedItem = n => p.find(x => x.name === n); p.refresh = () => {}; return p; }
});
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'language', { get: () => 'en-US' });
Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 8 });
Object.defineProperty(navigator, 'deviceMemory', { get: () => 8 });
Object.defineProperty(navigator, 'maxTouchPoints', { get: () => 0 });
Object.defineProperty(navigator, 'vendor', { get: () => 'Google Inc.' });
Object.defineProperty(navigator, 'platform', {
  get: () => navigator.userAgent.includes('Mac') ? 'MacIntel'
    : navigator.userAgent.includes('Win') ? 'Win32' : 'Linux x86_64'
});

if (navigator.permissions) {
  const query = navigator.permissions.query.bind(navigator.permissions);
  navigator.permissions.query = params => params.name === 'notifications'
    ? Promise.resolve({ state: Notification.permission })
    : query(params);
}

window.chrome = window.chrome || {};
window.chrome.app = window.chrome.app || { isInstalled: false };
window.chrome.runtime = window.chrome.runtime || {};
window.chrome.csi = window.chrome.csi || function () { return { pageT: Date.now() }; };
window.chrome.loadTimes = window.chrome.loadTimes || function () { return { connectionInfo: 'h2', wasNpnNegotiated: true }; };

for (const key in window) {
  if (/^(\$|cdc_|__webdriver|__driver|__selenium|__fxdriver)/.test(key)) {
    try { delete window[key]; } catch (e) {}
  }
}

Object.defineProperty(document, 'hidden', { get: () => false });
Object.defineProperty(document, 'visibilityState', { get: () => 'visible' });
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_click_embeds_locator() {
        let script = human_click(&FOLLOWING_BUTTON);
        assert!(script.starts_with("const el = (() => {"));
        assert!(script.contains("'mousedown'"));
        assert!(script.ends_with("return true;"));
    }

    #[test]
    fn profile_gone_lists_every_phrase() {
        let script = profile_gone();
        for phrase in UNAVAILABLE_PHRASES {
            assert!(script.contains(phrase), "missing {phrase}");
        }
    }

    #[test]
    fn scroll_is_a_function_body() {
        assert_eq!(
            scroll_by(120),
            "window.scrollBy({ top: 120, left: 0, behavior: 'smooth' }); return true;"
        );
    }
}
