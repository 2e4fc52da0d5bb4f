//! Porter stemmer, NLTK-extensions variant.
//!
//! The model artifacts were fitted on text stemmed by NLTK's `PorterStemmer`
//! in its default `NLTK_EXTENSIONS` mode, so this implementation follows that
//! variant rule for rule rather than the 1980 paper:
//!
//! - a pool of irregular forms (`skies` → `sky`, `dying` → `die`, …)
//! - words of one or two characters are returned unchanged
//! - four-letter `ies`/`ied` words keep their `ie` (`dies` → `die`)
//! - step 1c only turns `y` into `i` after a consonant
//! - `alli` is rewritten before the rest of step 2, which then runs again
//! - step 2 has the extra `fulli` and `logi` rules

use std::collections::HashMap;

/// Irregular forms mapped straight to their stem.
const IRREGULAR_FORMS: &[(&str, &[&str])] = &[
    ("sky", &["sky", "skies"]),
    ("die", &["dying"]),
    ("lie", &["lying"]),
    ("tie", &["tying"]),
    ("news", &["news"]),
    ("inning", &["innings", "inning"]),
    ("outing", &["outings", "outing"]),
    ("canning", &["cannings", "canning"]),
    ("howe", &["howe"]),
    ("proceed", &["proceed"]),
    ("exceed", &["exceed"]),
    ("succeed", &["succeed"]),
];

type Condition<'a> = &'a dyn Fn(&[char]) -> bool;

/// Deterministic Porter stemmer. Cheap to build, immutable once built.
#[derive(Debug, Clone)]
pub struct PorterStemmer {
    pool: HashMap<&'static str, &'static str>,
}

impl Default for PorterStemmer {
    fn default() -> Self {
        Self::new()
    }
}

impl PorterStemmer {
    pub fn new() -> Self {
        let mut pool = HashMap::new();
        for (stem, forms) in IRREGULAR_FORMS {
            for form in *forms {
                pool.insert(*form, *stem);
            }
        }
        Self { pool }
    }

    /// Stem a single token. The token is lower-cased first.
    pub fn stem(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if let Some(stem) = self.pool.get(lower.as_str()) {
            return (*stem).to_string();
        }

        let chars: Vec<char> = lower.chars().collect();
        if chars.len() <= 2 {
            return lower;
        }

        let w = step1a(chars);
        let w = step1b(w);
        let w = step1c(w);
        let w = step2(w);
        let w = step3(w);
        let w = step4(w);
        let w = step5a(w);
        let w = step5b(w);
        w.into_iter().collect()
    }
}

fn is_consonant(w: &[char], i: usize) -> bool {
    match w[i] {
        'a' | 'e' | 'i' | 'o' | 'u' => false,
        'y' => i == 0 || !is_consonant(w, i - 1),
        _ => true,
    }
}

/// Number of vowel-consonant sequences (the `m` of the paper).
fn measure(stem: &[char]) -> usize {
    (1..stem.len())
        .filter(|&i| !is_consonant(stem, i - 1) && is_consonant(stem, i))
        .count()
}

fn contains_vowel(stem: &[char]) -> bool {
    (0..stem.len()).any(|i| !is_consonant(stem, i))
}

fn ends_double_consonant(w: &[char]) -> bool {
    let n = w.len();
    n >= 2 && w[n - 1] == w[n - 2] && is_consonant(w, n - 1)
}

fn ends_cvc(w: &[char]) -> bool {
    let n = w.len();
    let classic = n >= 3
        && is_consonant(w, n - 3)
        && !is_consonant(w, n - 2)
        && is_consonant(w, n - 1)
        && !matches!(w[n - 1], 'w' | 'x' | 'y');
    let short = n == 2 && !is_consonant(w, 0) && is_consonant(w, 1);
    classic || short
}

fn ends_with(w: &[char], suffix: &str) -> bool {
    let n = suffix.chars().count();
    w.len() >= n && w[w.len() - n..].iter().copied().eq(suffix.chars())
}

fn strip(w: &[char], suffix: &str) -> Vec<char> {
    w[..w.len() - suffix.chars().count()].to_vec()
}

fn with_suffix(mut stem: Vec<char>, suffix: &str) -> Vec<char> {
    stem.extend(suffix.chars());
    stem
}

/// Apply the first rule whose suffix matches. A matching rule whose
/// condition fails stops the search and leaves the word untouched.
fn apply_rules(w: Vec<char>, rules: &[(&str, &str, Option<Condition<'_>>)]) -> Vec<char> {
    for (suffix, replacement, condition) in rules {
        if ends_with(&w, suffix) {
            let stem = strip(&w, suffix);
            return match condition {
                Some(cond) if !cond(stem.as_slice()) => w,
                _ => with_suffix(stem, replacement),
            };
        }
    }
    w
}

fn positive_measure(stem: &[char]) -> bool {
    measure(stem) > 0
}

fn measure_gt_1(stem: &[char]) -> bool {
    measure(stem) > 1
}

fn step1a(w: Vec<char>) -> Vec<char> {
    if w.len() == 4 && ends_with(&w, "ies") {
        return with_suffix(strip(&w, "ies"), "ie");
    }
    apply_rules(
        w,
        &[
            ("sses", "ss", None),
            ("ies", "i", None),
            ("ss", "ss", None),
            ("s", "", None),
        ],
    )
}

fn step1b(w: Vec<char>) -> Vec<char> {
    if ends_with(&w, "ied") {
        let replacement = if w.len() == 4 { "ie" } else { "i" };
        return with_suffix(strip(&w, "ied"), replacement);
    }

    if ends_with(&w, "eed") {
        let stem = strip(&w, "eed");
        return if measure(&stem) > 0 {
            with_suffix(stem, "ee")
        } else {
            w
        };
    }

    let intermediate = ["ed", "ing"]
        .iter()
        .filter(|suffix| ends_with(&w, suffix))
        .map(|suffix| strip(&w, suffix))
        .find(|stem| contains_vowel(stem));
    let Some(stem) = intermediate else {
        return w;
    };

    for (suffix, replacement) in [("at", "ate"), ("bl", "ble"), ("iz", "ize")] {
        if ends_with(&stem, suffix) {
            return with_suffix(strip(&stem, suffix), replacement);
        }
    }

    if ends_double_consonant(&stem) {
        let last = stem[stem.len() - 1];
        return if matches!(last, 'l' | 's' | 'z') {
            stem
        } else {
            stem[..stem.len() - 1].to_vec()
        };
    }

    if measure(&stem) == 1 && ends_cvc(&stem) {
        with_suffix(stem, "e")
    } else {
        stem
    }
}

fn step1c(w: Vec<char>) -> Vec<char> {
    let after_consonant: Condition<'_> =
        &|stem: &[char]| stem.len() > 1 && is_consonant(stem, stem.len() - 1);
    apply_rules(w, &[("y", "i", Some(after_consonant))])
}

fn step2(w: Vec<char>) -> Vec<char> {
    if ends_with(&w, "alli") && positive_measure(&strip(&w, "alli")) {
        return step2(with_suffix(strip(&w, "alli"), "al"));
    }

    // `logi` keeps its `l` with the stem so `geo`/`theo` stems qualify.
    let logi_stem = w[..w.len().saturating_sub(3)].to_vec();
    let logi: Condition<'_> = &|_: &[char]| positive_measure(&logi_stem);

    let pm: Condition<'_> = &positive_measure;
    apply_rules(
        w,
        &[
            ("ational", "ate", Some(pm)),
            ("tional", "tion", Some(pm)),
            ("enci", "ence", Some(pm)),
            ("anci", "ance", Some(pm)),
            ("izer", "ize", Some(pm)),
            ("bli", "ble", Some(pm)),
            ("alli", "al", Some(pm)),
            ("entli", "ent", Some(pm)),
            ("eli", "e", Some(pm)),
            ("ousli", "ous", Some(pm)),
            ("ization", "ize", Some(pm)),
            ("ation", "ate", Some(pm)),
            ("ator", "ate", Some(pm)),
            ("alism", "al", Some(pm)),
            ("iveness", "ive", Some(pm)),
            ("fulness", "ful", Some(pm)),
            ("ousness", "ous", Some(pm)),
            ("aliti", "al", Some(pm)),
            ("iviti", "ive", Some(pm)),
            ("biliti", "ble", Some(pm)),
            ("fulli", "ful", Some(pm)),
            ("logi", "log", Some(logi)),
        ],
    )
}

fn step3(w: Vec<char>) -> Vec<char> {
    let pm: Condition<'_> = &positive_measure;
    apply_rules(
        w,
        &[
            ("icate", "ic", Some(pm)),
            ("ative", "", Some(pm)),
            ("alize", "al", Some(pm)),
            ("iciti", "ic", Some(pm)),
            ("ical", "ic", Some(pm)),
            ("ful", "", Some(pm)),
            ("ness", "", Some(pm)),
        ],
    )
}

fn step4(w: Vec<char>) -> Vec<char> {
    let gt1: Condition<'_> = &measure_gt_1;
    let ion: Condition<'_> =
        &|stem: &[char]| measure(stem) > 1 && matches!(stem.last(), Some('s' | 't'));
    apply_rules(
        w,
        &[
            ("al", "", Some(gt1)),
            ("ance", "", Some(gt1)),
            ("ence", "", Some(gt1)),
            ("er", "", Some(gt1)),
            ("ic", "", Some(gt1)),
            ("able", "", Some(gt1)),
            ("ible", "", Some(gt1)),
            ("ant", "", Some(gt1)),
            ("ement", "", Some(gt1)),
            ("ment", "", Some(gt1)),
            ("ent", "", Some(gt1)),
            ("ion", "", Some(ion)),
            ("ou", "", Some(gt1)),
            ("ism", "", Some(gt1)),
            ("ate", "", Some(gt1)),
            ("iti", "", Some(gt1)),
            ("ous", "", Some(gt1)),
            ("ive", "", Some(gt1)),
            ("ize", "", Some(gt1)),
        ],
    )
}

fn step5a(w: Vec<char>) -> Vec<char> {
    if ends_with(&w, "e") {
        let stem = strip(&w, "e");
        let m = measure(&stem);
        if m > 1 || (m == 1 && !ends_cvc(&stem)) {
            return stem;
        }
    }
    w
}

fn step5b(w: Vec<char>) -> Vec<char> {
    if ends_with(&w, "ll") && measure(&w[..w.len() - 1]) > 1 {
        return w[..w.len() - 1].to_vec();
    }
    w
}
