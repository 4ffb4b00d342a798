//! Fixed label tables for the segmentations SynthSeg produces.
//!
//! Labels without cortical parcellation follow
//! https://github.com/BBillot/SynthSeg/blob/master/data/labels%20table.txt

/// Index to structure name, sorted by index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<(u32, &'static str)>,
}

const SYNTHSEG_LABELS: &[(u32, &str)] = &[
    (0, "background"),
    (2, "left_cerebral_white_matter"),
    (3, "left_cerebral_cortex"),
    (4, "left_lateral_ventricle"),
    (5, "left_inferior_lateral_ventricle"),
    (7, "left_cerebellum_white_matter"),
    (8, "left_cerebellum_cortex"),
    (10, "left_thalamus"),
    (11, "left_caudate"),
    (12, "left_putamen"),
    (13, "left_pallidum"),
    (14, "3rd_ventricle"),
    (15, "4th_ventricle"),
    (16, "brain-stem"),
    (17, "left_hippocampus"),
    (18, "left_amygdala"),
    (26, "left_accumbens_area"),
    (28, "left_ventral_DC"),
    (41, "right_cerebral_white_matter"),
    (42, "right_cerebral_cortex"),
    (43, "right_lateral_ventricle"),
    (44, "right_inferior_lateral_ventricle"),
    (46, "right_cerebellum_white_matter"),
    (47, "right_cerebellum_cortex"),
    (49, "right_thalamus"),
    (50, "right_caudate"),
    (51, "right_putamen"),
    (52, "right_pallidum"),
    (53, "right_hippocampus"),
    (54, "right_amygdala"),
    (58, "right_accumbens_area"),
    (60, "right_ventral_DC"),
];

const CSF_LABEL: (u32, &str) = (24, "CSF");

const ANTSCT_LABELS: &[(u32, &str)] = &[
    (0, "background"),
    (1, "CSF"),
    (2, "cortical_gray_matter"),
    (3, "white_matter"),
    (4, "subcortical_gray_matter"),
    (5, "brain_stem"),
    (6, "cerebellum"),
];

/// Short BIDS label codes of the antsct posteriors, in class order 1..=6
pub const ANTSCT_POSTERIOR_CODES: [&str; 6] = ["CSF", "CGM", "WM", "SGM", "BS", "CBM"];

impl LabelTable {
    fn from_entries(mut entries: Vec<(u32, &'static str)>) -> Self {
        entries.sort_by_key(|&(index, _)| index);
        Self { entries }
    }

    /// The SynthSeg table: background and 31 structures, 32 with CSF
    pub fn synthseg(include_csf: bool) -> Self {
        let mut entries = SYNTHSEG_LABELS.to_vec();
        if include_csf {
            entries.push(CSF_LABEL);
        }
        Self::from_entries(entries)
    }

    /// The seven-class antsct table, background included
    pub fn antsct() -> Self {
        Self::from_entries(ANTSCT_LABELS.to_vec())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(u32, &'static str)] {
        &self.entries
    }

    /// Names in index order, as used for probseg label maps
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|&(_, name)| name).collect()
    }

    /// The dseg.tsv body: `index\tname` header then one row per label
    pub fn to_tsv(&self) -> String {
        let mut tsv = String::from("index\tname\n");
        for (index, name) in &self.entries {
            tsv.push_str(&format!("{}\t{}\n", index, name));
        }
        tsv
    }
}
