//! Digit templates and placed digits.
//!
//! A template holds all geometry relative to its own top left corner. Digits
//! are templates translated to an absolute position in the image.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::instrument;

use crate::config::TemplateConfig;
use crate::error::{LcdError, Result};
use crate::point::{BBox, PList, Point, BL, BR, TL, TR};

/// Distance the off region is kept away from the segments, beyond the line width.
pub const OFF_MARGIN: i32 = 5;
/// Distance a segment's sample box is slid from across the stroke to along it.
pub const ON_MARGIN: i32 = 2;

pub const SEGMENTS: usize = 7;

/// Segments of a digit. The discriminant is the bit position in a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    TopLeft = 0,
    TopMiddle = 1,
    TopRight = 2,
    BottomRight = 3,
    BottomMiddle = 4,
    BottomLeft = 5,
    Middle = 6,
}

impl Segment {
    pub const ALL: [Segment; SEGMENTS] = [
        Segment::TopLeft,
        Segment::TopMiddle,
        Segment::TopRight,
        Segment::BottomRight,
        Segment::BottomMiddle,
        Segment::BottomLeft,
        Segment::Middle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn mask(self) -> u8 {
        1 << self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Segment::TopLeft => "TL",
            Segment::TopMiddle => "TM",
            Segment::TopRight => "TR",
            Segment::BottomRight => "BR",
            Segment::BottomMiddle => "BM",
            Segment::BottomLeft => "BL",
            Segment::Middle => "MM",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    pub bb: BBox,
    pub points: PList,
}

impl Region {
    fn offset(&self, x: i32, y: i32) -> Region {
        Region {
            bb: self.bb.offset(x, y),
            points: self.points.offset(x, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalPoint {
    pub point: Point,
    pub points: PList,
}

/// Geometry of one type/size of 7-segment digit.
#[derive(Debug)]
pub struct Template {
    name: String,
    line: i32,
    bb: BBox,
    mr: Point,
    ml: Point,
    tmr: Point,
    tml: Point,
    bmr: Point,
    bml: Point,
    off: PList,
    segments: [Region; SEGMENTS],
    dp: Option<DecimalPoint>,
}

impl Template {
    /// Builds a template from its four corners and line width.
    ///
    /// The corners are normalised so the top left becomes (0,0). Every sample
    /// region is enumerated here once; regions are made pairwise disjoint by
    /// letting segments claim points first, then the off region, then the
    /// decimal point.
    #[instrument(level = "debug", skip(conf), fields(name = %conf.name))]
    pub fn build(conf: &TemplateConfig) -> Result<Template> {
        let degenerate = |reason: &str| LcdError::DegenerateTemplate {
            name: conf.name.clone(),
            reason: reason.to_string(),
        };
        let line = conf.width;
        if line <= 0 {
            return Err(degenerate("line width must be positive"));
        }
        let origin = Point::from(conf.tl);
        let rel = |p: [i32; 2]| Point::from(p) - origin;
        let bb = BBox::new(Point::default(), rel(conf.tr), rel(conf.br), rel(conf.bl));
        if bb.area() == 0.0 {
            return Err(degenerate("corners do not enclose an area"));
        }

        let ml = bb[TL].split(bb[BL], 2)[0];
        let mr = bb[TR].split(bb[BR], 2)[0];
        let half = line / 2;
        let tmr = mr.adjust(bb[TR], half);
        let bmr = mr.adjust(bb[BR], half);
        let tml = ml.adjust(bb[TL], half);
        let bml = ml.adjust(bb[BL], half);

        let margin = ON_MARGIN.min((line - 1) / 2);
        let seg = |s, e, cs, ce, ts, te| {
            let bb = segment_bb(s, e, cs, ce, ts, te, line, margin);
            Region {
                bb,
                points: bb.points(),
            }
        };
        // Order must match the bit allocation of `Segment`.
        let mut segments = [
            seg(bb[TL], ml, bb[TR], mr, line, half),
            seg(bb[TL], bb[TR], bb[BL], bb[BR], line, line),
            seg(bb[TR], mr, bb[TL], ml, line, half),
            seg(mr, bb[BR], ml, bb[BL], half, line),
            seg(bb[BL], bb[BR], bb[TL], bb[TR], line, line),
            seg(ml, bb[BL], mr, bb[BR], half, line),
            seg(tml, tmr, bml, bmr, line, line),
        ];

        let shrink = line + OFF_MARGIN;
        let mut off: PList = [
            BBox::new(bb[TL], bb[TR], bmr, bml),
            BBox::new(tml, tmr, bb[BR], bb[BL]),
        ]
        .iter()
        .filter_map(|b| b.inner(shrink))
        .flat_map(|b| b.points().to_vec())
        .collect();

        let mut dp = conf.dp.map(|p| {
            let point = rel(p);
            DecimalPoint {
                point,
                points: point.block((line + 1) / 2),
            }
        });

        let mut claimed = HashSet::new();
        for (segment, region) in Segment::ALL.iter().zip(segments.iter_mut()) {
            region.points.retain(|p| claimed.insert(*p));
            if region.points.is_empty() {
                return Err(LcdError::EmptyRegion {
                    template: conf.name.clone(),
                    region: segment.name().to_string(),
                });
            }
        }
        off.retain(|p| claimed.insert(*p));
        if off.is_empty() {
            return Err(LcdError::EmptyRegion {
                template: conf.name.clone(),
                region: "off".to_string(),
            });
        }
        if let Some(dp) = dp.as_mut() {
            dp.points.retain(|p| claimed.insert(*p));
            if dp.points.is_empty() {
                return Err(LcdError::EmptyRegion {
                    template: conf.name.clone(),
                    region: "decimal point".to_string(),
                });
            }
        }
        log::debug!(
            "Template {}: {} off points, segment points {:?}",
            conf.name,
            off.len(),
            segments.iter().map(|s| s.points.len()).collect::<Vec<_>>()
        );

        Ok(Template {
            name: conf.name.clone(),
            line,
            bb,
            mr,
            ml,
            tmr,
            tml,
            bmr,
            bml,
            off,
            segments,
            dp,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn line_width(&self) -> i32 {
        self.line
    }

    pub fn bbox(&self) -> &BBox {
        &self.bb
    }

    pub fn segment(&self, segment: Segment) -> &Region {
        &self.segments[segment.index()]
    }

    pub fn off(&self) -> &PList {
        &self.off
    }

    pub fn decimal_point(&self) -> Option<&DecimalPoint> {
        self.dp.as_ref()
    }

    /// Middle points of the left and right edges (ml, mr).
    pub fn middle(&self) -> (Point, Point) {
        (self.ml, self.mr)
    }
}

/// Sample box for one stroke.
///
/// `s`→`e` runs along the outer edge of the stroke, `cs` and `ce` are the
/// matching points on the far side of the digit and give the inward
/// direction. The stroke is trimmed back by `ts`/`te` from each end, then
/// `margin` is moved from across the stroke to along it.
#[allow(clippy::too_many_arguments)]
fn segment_bb(
    s: Point,
    e: Point,
    cs: Point,
    ce: Point,
    ts: i32,
    te: i32,
    line: i32,
    margin: i32,
) -> BBox {
    let a = s.adjust(e, ts - margin);
    let b = e.adjust(s, te - margin);
    let at_s = |d| a + (s.adjust(cs, d) - s);
    let at_e = |d| b + (e.adjust(ce, d) - e);
    BBox::new(
        at_s(margin),
        at_e(margin),
        at_e(line - margin),
        at_s(line - margin),
    )
}

/// One placed 7-segment digit. All geometry is absolute.
#[derive(Debug, Clone)]
pub struct Digit {
    index: usize,
    template: Arc<Template>,
    origin: Point,
    bb: BBox,
    tmr: Point,
    tml: Point,
    bmr: Point,
    bml: Point,
    off: PList,
    segments: [Region; SEGMENTS],
    dp: Option<DecimalPoint>,
    extent: (Point, Point),
}

impl Digit {
    /// Places `template` with its top left corner at `origin`.
    pub fn place(index: usize, template: Arc<Template>, origin: Point) -> Digit {
        let (x, y) = (origin.x, origin.y);
        let segments = std::array::from_fn(|i| template.segments[i].offset(x, y));
        let dp = template.dp.as_ref().map(|dp| DecimalPoint {
            point: dp.point.offset(x, y),
            points: dp.points.offset(x, y),
        });
        let mut digit = Digit {
            index,
            origin,
            bb: template.bb.offset(x, y),
            tmr: template.tmr.offset(x, y),
            tml: template.tml.offset(x, y),
            bmr: template.bmr.offset(x, y),
            bml: template.bml.offset(x, y),
            off: template.off.offset(x, y),
            segments,
            dp,
            extent: (origin, origin),
            template,
        };
        digit.extent = digit.compute_extent();
        digit
    }

    fn compute_extent(&self) -> (Point, Point) {
        let all = self
            .segments
            .iter()
            .flat_map(|r| r.points.iter())
            .chain(self.off.iter())
            .chain(self.dp.iter().flat_map(|dp| dp.points.iter()));
        all.fold((self.origin, self.origin), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn bbox(&self) -> &BBox {
        &self.bb
    }

    /// Inner corners of the middle segment (tml, tmr, bmr, bml).
    pub fn middle_band(&self) -> BBox {
        BBox::new(self.tml, self.tmr, self.bmr, self.bml)
    }

    pub fn segment(&self, segment: Segment) -> &Region {
        &self.segments[segment.index()]
    }

    pub fn segments(&self) -> &[Region; SEGMENTS] {
        &self.segments
    }

    pub fn off(&self) -> &PList {
        &self.off
    }

    pub fn decimal_point(&self) -> Option<&DecimalPoint> {
        self.dp.as_ref()
    }

    /// Whether every sampled point lies inside a `width` x `height` image.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        let (lo, hi) = self.extent;
        lo.x >= 0 && lo.y >= 0 && (hi.x as i64) < width as i64 && (hi.y as i64) < height as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(corners: [[i32; 2]; 4], width: i32, dp: Option<[i32; 2]>) -> TemplateConfig {
        TemplateConfig {
            name: "t".to_string(),
            tl: corners[0],
            tr: corners[1],
            br: corners[2],
            bl: corners[3],
            width,
            dp,
        }
    }

    fn all_regions(t: &Template) -> Vec<&PList> {
        let mut regions: Vec<&PList> = t.segments.iter().map(|r| &r.points).collect();
        regions.push(&t.off);
        if let Some(dp) = &t.dp {
            regions.push(&dp.points);
        }
        regions
    }

    fn assert_disjoint(t: &Template) {
        let mut seen = HashSet::new();
        for region in all_regions(t) {
            assert!(!region.is_empty());
            for p in region.iter() {
                assert!(seen.insert(*p), "{p:?} sampled twice");
            }
        }
    }

    #[test]
    fn upright_template_regions() {
        let t = Template::build(&conf([[0, 0], [20, 0], [20, 40], [0, 40]], 4, None)).unwrap();
        assert_disjoint(&t);
        assert_eq!(t.middle(), (Point::new(0, 20), Point::new(20, 20)));
        let tl = t.segment(Segment::TopLeft);
        assert_eq!(tl.points.len(), 2 * 16);
        assert!(tl.points.iter().all(|p| (1..3).contains(&p.x)));
        let mm = t.segment(Segment::Middle);
        assert!(mm.points.iter().all(|p| p.y == 19 || p.y == 20));
        assert_eq!(t.off().len(), 16);
    }

    #[test]
    fn regions_are_disjoint_for_varied_templates() {
        let shapes = [
            ([[0, 0], [20, 0], [20, 40], [0, 40]], 4),
            ([[5, 5], [35, 5], [35, 65], [5, 65]], 7),
            ([[0, 0], [24, 0], [24, 44], [0, 44]], 1),
            ([[10, 0], [32, 0], [24, 44], [2, 44]], 5),
            ([[3, 1], [40, 4], [37, 80], [0, 77]], 6),
        ];
        for (corners, width) in shapes {
            let t = Template::build(&conf(corners, width, None)).unwrap();
            assert_disjoint(&t);
        }
    }

    #[test]
    fn template_is_relative_to_top_left() {
        let a = Template::build(&conf([[0, 0], [20, 0], [20, 40], [0, 40]], 4, Some([22, 40])))
            .unwrap();
        let b = Template::build(&conf(
            [[100, 50], [120, 50], [120, 90], [100, 90]],
            4,
            Some([122, 90]),
        ))
        .unwrap();
        for s in Segment::ALL {
            assert_eq!(a.segment(s), b.segment(s));
        }
        assert_eq!(a.off(), b.off());
        assert_eq!(a.decimal_point(), b.decimal_point());
        assert_eq!(a.decimal_point().unwrap().points.len(), 25);
        assert_disjoint(&a);
    }

    #[test]
    fn rejects_degenerate_templates() {
        let err = Template::build(&conf([[0, 0], [20, 0], [20, 40], [0, 40]], 0, None));
        assert!(matches!(err, Err(LcdError::DegenerateTemplate { .. })));
        let err = Template::build(&conf([[0, 0], [10, 10], [20, 20], [30, 30]], 3, None));
        assert!(matches!(err, Err(LcdError::DegenerateTemplate { .. })));
        let err = Template::build(&conf([[0, 0], [8, 0], [8, 16], [0, 16]], 3, None));
        assert!(matches!(err, Err(LcdError::EmptyRegion { .. })));
    }

    #[test]
    fn digit_is_translated_template() {
        let t = Arc::new(
            Template::build(&conf([[0, 0], [20, 0], [20, 40], [0, 40]], 4, Some([22, 40])))
                .unwrap(),
        );
        let d = Digit::place(3, t.clone(), Point::new(100, 7));
        assert_eq!(d.index(), 3);
        for s in Segment::ALL {
            assert_eq!(d.segment(s).points, t.segment(s).points.offset(100, 7));
        }
        assert_eq!(d.off(), &t.off().offset(100, 7));
        assert_eq!(d.decimal_point().unwrap().point, Point::new(122, 47));
        assert!(d.fits(125, 50));
        assert!(!d.fits(124, 50));
    }
}
